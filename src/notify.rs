//! Service manager readiness notifications

use log::{debug, warn};
use std::ffi::OsStr;
use std::io;
use std::os::linux::net::SocketAddrExt;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::net::{SocketAddr, UnixDatagram};

const NOTIFY_SOCKET: &str = "NOTIFY_SOCKET";

/// Tell the service manager the controller is running.
pub fn ready() {
    notify("READY=1");
}

/// Tell the service manager the controller is shutting down.
pub fn stopping() {
    notify("STOPPING=1");
}

fn notify(state: &str) {
    let Some(socket) = std::env::var_os(NOTIFY_SOCKET) else {
        debug!("{} not set, skipping {}", NOTIFY_SOCKET, state);
        return;
    };

    match send_to(&socket, state) {
        Ok(()) => debug!("Sent {} to {:?}", state, socket),
        Err(e) => warn!("Unable to send {} to {:?}: {}", state, socket, e),
    }
}

/// Send one `sd_notify` datagram to `socket`. A leading `@` names an
/// abstract socket.
pub fn send_to(socket: &OsStr, state: &str) -> io::Result<()> {
    let sock = UnixDatagram::unbound()?;
    let bytes = socket.as_bytes();

    match bytes.split_first() {
        Some((b'@', name)) => {
            let addr = SocketAddr::from_abstract_name(name)?;
            sock.send_to_addr(state.as_bytes(), &addr)?;
        }
        Some(_) => {
            sock.send_to(state.as_bytes(), socket)?;
        }
        None => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "empty notify socket path",
            ))
        }
    }
    Ok(())
}
