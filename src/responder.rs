//! Static file responses.
//!
//! A validated filename is joined to the base directory, opened
//! read-only, and streamed to the client with `sendfile(2)` so file
//! bytes never pass through user space. Open failures map onto the
//! canned 404/403/500 responses.

use crate::http::{self, HttpError};
use nix::errno::Errno;
use nix::sys::sendfile::sendfile;
use std::fs::File;
use std::io::{self, Read, Result, Seek, SeekFrom, Write};
use std::os::unix::io::AsFd;
use std::path::Path;

/// Write one complete response for `name` under `root`.
///
/// `Ok(())` means a correctly framed response went out, whatever its
/// status. `Err` means the transport failed mid-response; the caller
/// drops the connection and nothing more can be done for this client.
pub fn serve_file<S: Write + AsFd>(sock: &mut S, root: &Path, name: &str) -> Result<()> {
    let path = root.join(name);

    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) => {
            sock.write_all(classify_open_error(&e).response())?;
            return Ok(());
        }
    };

    let metadata = match file.metadata() {
        Ok(m) => m,
        Err(_) => {
            sock.write_all(HttpError::InternalError.response())?;
            return Ok(());
        }
    };
    // Directories and other non-regular files open fine but cannot be
    // served; answering 500 beats sending a header with a bogus length.
    if !metadata.is_file() {
        sock.write_all(HttpError::InternalError.response())?;
        return Ok(());
    }

    let size = metadata.len();
    sock.write_all(&http::ok_header(size))?;
    transfer(sock, &file, size)
}

/// Send exactly `size` bytes of `file` starting at offset 0.
fn transfer<S: Write + AsFd>(sock: &mut S, file: &File, size: u64) -> Result<()> {
    let mut offset: libc::off_t = 0;
    while (offset as u64) < size {
        let remaining = (size - offset as u64) as usize;
        match sendfile(&*sock, file, Some(&mut offset), remaining) {
            // EOF before the stat'd size; the file shrank under us.
            Ok(0) => break,
            Ok(_) => {}
            Err(Errno::EINTR) => continue,
            Err(Errno::EINVAL) | Err(Errno::ENOSYS) if offset == 0 => {
                // Target fd or filesystem refuses sendfile; copy through
                // user space instead.
                return copy_fallback(sock, file, size);
            }
            Err(e) => return Err(io::Error::new(io::ErrorKind::Other, e)),
        }
    }
    Ok(())
}

fn copy_fallback<S: Write>(sock: &mut S, mut file: &File, size: u64) -> Result<()> {
    file.seek(SeekFrom::Start(0))?;
    let mut limited = file.take(size);
    io::copy(&mut limited, sock)?;
    Ok(())
}

fn classify_open_error(e: &io::Error) -> HttpError {
    match e.kind() {
        io::ErrorKind::NotFound => HttpError::NotFound,
        io::ErrorKind::PermissionDenied => HttpError::Forbidden,
        _ => HttpError::InternalError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{RESPONSE_FORBIDDEN, RESPONSE_INTERNAL_ERROR, RESPONSE_NOT_FOUND};
    use std::fs;
    use std::os::unix::net::UnixStream;
    use std::path::PathBuf;
    use std::thread;

    fn fixture_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("quern-responder-{tag}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn collect_response(dir: &Path, name: &str) -> Vec<u8> {
        let (mut server_side, mut client_side) = UnixStream::pair().unwrap();
        serve_file(&mut server_side, dir, name).unwrap();
        drop(server_side);
        let mut response = Vec::new();
        client_side.read_to_end(&mut response).unwrap();
        response
    }

    fn body_of(response: &[u8]) -> &[u8] {
        let at = response
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("response has a header/body separator");
        &response[at + 4..]
    }

    #[test]
    fn test_serves_existing_file() {
        let dir = fixture_dir("ok");
        fs::write(dir.join("hello.txt"), b"hello from quern\n").unwrap();

        let response = collect_response(&dir, "hello.txt");
        let text = String::from_utf8_lossy(&response);
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 17\r\n"));
        assert_eq!(body_of(&response), b"hello from quern\n");
    }

    #[test]
    fn test_serves_file_larger_than_socket_buffer() {
        let dir = fixture_dir("big");
        let payload: Vec<u8> = (0..512 * 1024).map(|i| (i % 251) as u8).collect();
        fs::write(dir.join("big.bin"), &payload).unwrap();

        let (mut server_side, mut client_side) = UnixStream::pair().unwrap();
        let reader = thread::spawn(move || {
            let mut response = Vec::new();
            client_side.read_to_end(&mut response).unwrap();
            response
        });
        serve_file(&mut server_side, &dir, "big.bin").unwrap();
        drop(server_side);

        let response = reader.join().unwrap();
        assert_eq!(body_of(&response), &payload[..]);
    }

    #[test]
    fn test_missing_file_is_404() {
        let dir = fixture_dir("missing");
        assert_eq!(collect_response(&dir, "no-such-file"), RESPONSE_NOT_FOUND);
    }

    #[test]
    fn test_directory_is_500() {
        let dir = fixture_dir("dir");
        fs::create_dir_all(dir.join("sub")).unwrap();
        assert_eq!(collect_response(&dir, "sub"), RESPONSE_INTERNAL_ERROR);
    }

    #[test]
    fn test_unreadable_file_is_403() {
        use std::os::unix::fs::PermissionsExt;

        // Permission bits do not apply to root; skip there.
        if unsafe { libc::geteuid() } == 0 {
            return;
        }

        let dir = fixture_dir("denied");
        let path = dir.join("secret.txt");
        fs::write(&path, b"secret").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();

        assert_eq!(collect_response(&dir, "secret.txt"), RESPONSE_FORBIDDEN);
    }

    #[test]
    fn test_repeated_requests_are_identical() {
        let dir = fixture_dir("repeat");
        fs::write(dir.join("same.txt"), b"stable contents").unwrap();

        let first = collect_response(&dir, "same.txt");
        let second = collect_response(&dir, "same.txt");
        assert_eq!(first, second);
    }
}
