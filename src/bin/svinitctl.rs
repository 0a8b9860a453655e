//! Control CLI entry point.
//!
//! A thin client: resolve how to reach the daemon, send one request over the
//! control-protocol byte format on a Unix stream socket, print the reply.
//! Commands are `clap` subcommands rather than hand-parsed `argv`.

use std::io;
use std::os::unix::net::UnixStream;
use std::process::ExitCode;

use clap::Parser;

use svinit::cli::{SvinitctlArgs, SvinitctlCommand};
use svinit::protocol::{read_frame, write_frame, Request, Response};

fn roundtrip(stream: &mut UnixStream, request: Request) -> io::Result<Response> {
    write_frame(stream, &request.encode())?;
    let bytes = read_frame(stream)?;
    Response::decode(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

struct FoundService {
    handle: u32,
    state: u8,
    target_state: u8,
}

fn find_service(stream: &mut UnixStream, name: &str) -> io::Result<Option<FoundService>> {
    match roundtrip(stream, Request::FindService(name.to_string()))? {
        Response::ServiceRecord { handle, state, target_state } => {
            Ok(Some(FoundService { handle, state, target_state }))
        }
        Response::NoService => Ok(None),
        other => Err(io::Error::new(io::ErrorKind::InvalidData, format!("unexpected reply: {other:?}"))),
    }
}

fn print_state(state: u8, target: u8) {
    let name = |b: u8| match b {
        0 => "stopped",
        1 => "starting",
        2 => "started",
        3 => "stopping",
        _ => "unknown",
    };
    println!("state: {}  target: {}", name(state), if target == 1 { "started" } else { "stopped" });
}

fn main() -> ExitCode {
    let args = SvinitctlArgs::parse();
    let socket_path = args.socket_path();

    let mut stream = match UnixStream::connect(&socket_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to connect to {}: {e}", socket_path.display());
            return ExitCode::FAILURE;
        }
    };

    let result = match args.command {
        SvinitctlCommand::Status { service } => match find_service(&mut stream, &service) {
            Ok(Some(found)) => {
                print_state(found.state, found.target_state);
                Ok(())
            }
            Ok(None) => {
                eprintln!("no such service: {service:?}");
                Err(io::Error::new(io::ErrorKind::NotFound, "no such service"))
            }
            Err(e) => Err(e),
        },
        SvinitctlCommand::Start { service, pin } => match find_service(&mut stream, &service) {
            Ok(Some(found)) => {
                roundtrip(&mut stream, Request::Start { pin, handle: found.handle }).map(|r| println!("{r:?}"))
            }
            Ok(None) => Err(io::Error::new(io::ErrorKind::NotFound, format!("no such service: {service:?}"))),
            Err(e) => Err(e),
        },
        SvinitctlCommand::Stop { service, pin } => match find_service(&mut stream, &service) {
            Ok(Some(found)) => {
                roundtrip(&mut stream, Request::Stop { pin, handle: found.handle }).map(|r| println!("{r:?}"))
            }
            Ok(None) => Err(io::Error::new(io::ErrorKind::NotFound, format!("no such service: {service:?}"))),
            Err(e) => Err(e),
        },
        SvinitctlCommand::List => (|| {
            write_frame(&mut stream, &Request::ListServices.encode())?;
            loop {
                let bytes = read_frame(&mut stream)?;
                match Response::decode(&bytes) {
                    Ok(Response::SvcInfo { name, state, target }) => {
                        print!("{name}: ");
                        print_state(state, target);
                    }
                    Ok(Response::ListDone) => break,
                    Ok(other) => {
                        return Err(io::Error::new(io::ErrorKind::InvalidData, format!("unexpected reply: {other:?}")))
                    }
                    Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
                }
            }
            Ok(())
        })(),
        SvinitctlCommand::Shutdown { kind } => {
            roundtrip(&mut stream, Request::Shutdown(kind.into())).map(|r| println!("{r:?}"))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("svinitctl: {e}");
            ExitCode::FAILURE
        }
    }
}
