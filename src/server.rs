// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! TCP transport: accept loop and the per-connection frame loop. One thread
//! per connection; each connection gets its own [`Session`] over the shared
//! root, and its fid table dies with the connection.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use anyhow::Result as AnyResult;
use log::{debug, info, warn};

use crate::node::FsNode;
use crate::session::Session;

/// Upper bound on a single frame; requests beyond it are connection-fatal.
const MAX_FRAME: usize = 1 << 20;

/// Bind `addr` and serve the tree forever.
pub fn serve(addr: &str, root: Arc<FsNode>) -> AnyResult<()> {
    let listener = TcpListener::bind(addr)?;
    info!("serving 9P on {addr}");
    serve_listener(listener, root)
}

/// Accept loop over an already-bound listener. Useful for tests that bind an
/// ephemeral port themselves.
pub fn serve_listener(listener: TcpListener, root: Arc<FsNode>) -> AnyResult<()> {
    loop {
        let (stream, peer) = listener.accept()?;
        info!("accepted connection from {peer}");
        let session = Session::new(root.clone());
        thread::spawn(move || {
            if let Err(err) = serve_connection(stream, &session) {
                warn!("connection {peer} closed: {err}");
            }
        });
    }
}

fn serve_connection(mut stream: TcpStream, session: &Session) -> AnyResult<()> {
    loop {
        let Some(frame) = read_frame(&mut stream)? else {
            debug!("client closed connection");
            return Ok(());
        };
        let reply = session.handle_frame(&frame)?;
        stream.write_all(&reply)?;
    }
}

/// Read one size-prefixed frame. `None` signals a clean end of stream.
fn read_frame(stream: &mut TcpStream) -> io::Result<Option<Vec<u8>>> {
    let mut size = [0u8; 4];
    match stream.read_exact(&mut size) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err),
    }
    let declared = u32::from_le_bytes(size) as usize;
    if !(5..=MAX_FRAME).contains(&declared) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unreasonable frame size {declared}"),
        ));
    }
    let mut frame = vec![0u8; declared];
    frame[0..4].copy_from_slice(&size);
    stream.read_exact(&mut frame[4..])?;
    Ok(Some(frame))
}
