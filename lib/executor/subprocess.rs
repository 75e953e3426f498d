//! Streaming a child process's stdout/stderr live while waiting for it to
//! exit, adapted from the same `poll`-based approach used for ninja build
//! commands.

use nix::poll::{poll, PollFd, PollFlags};
use std::fs::File;
use std::io::{Read, Result as IoResult};
use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd};
use std::process::{Child, ExitStatus};
use std::slice::from_raw_parts_mut;

use crate::reporter::Source;

/// Waits for `child` to finish, calling `output_callback` with chunks of its
/// stdout/stderr as they arrive (captured only for streams set to
/// [`Stdio::piped`][std::process::Stdio::piped]).
pub fn listen_to_child(mut child: Child, output_callback: &dyn Fn(Source, &[u8])) -> IoResult<ExitStatus> {
	let mut fds = [
		child.stdout.take().map(|f| unsafe { into_file(f) }),
		child.stderr.take().map(|f| unsafe { into_file(f) }),
	];

	let mut buffer = Vec::<u8>::with_capacity(16 * 1024);
	let mut buffer_source = Source::Stdout;

	loop {
		// `i` tags each live `PollFd` with which of `fds` it came from, since
		// a closed stream is simply omitted from the slice passed to `poll`.
		let mut tagged: Vec<(usize, PollFd)> = fds
			.iter()
			.enumerate()
			.filter_map(|(i, f)| f.as_ref().map(|f| (i, PollFd::new(f.as_raw_fd(), PollFlags::POLLIN))))
			.collect();
		if tagged.is_empty() {
			break;
		}
		let mut live: Vec<PollFd> = tagged.iter().map(|(_, pfd)| *pfd).collect();

		if poll(&mut live, -1).map_err(std::io::Error::from)? == 0 {
			continue;
		}
		for (slot, pfd) in live.iter().enumerate() {
			tagged[slot].1 = *pfd;
		}

		for (i, pfd) in tagged {
			let source = if i == 0 { Source::Stdout } else { Source::Stderr };
			let revents = match pfd.revents() {
				Some(r) => r,
				None => continue,
			};

			if revents.contains(PollFlags::POLLIN) {
				if source != buffer_source && !buffer.is_empty() {
					output_callback(buffer_source, &buffer);
					buffer.clear();
				}
				buffer_source = source;

				buffer.reserve(4 * 1024);
				let buffer_free_space = unsafe {
					from_raw_parts_mut(buffer.as_mut_ptr().add(buffer.len()), buffer.capacity() - buffer.len())
				};
				let n_read = fds[i].as_mut().unwrap().read(buffer_free_space).unwrap_or(0);
				let new_len = buffer.len() + n_read;
				unsafe { buffer.set_len(new_len) };
				if n_read == 0 {
					fds[i].take();
				}
			}

			if revents.intersects(PollFlags::POLLERR | PollFlags::POLLHUP) {
				fds[i].take();
			}
		}
	}

	if !buffer.is_empty() {
		output_callback(buffer_source, &buffer);
		buffer.clear();
	}

	child.wait()
}

unsafe fn into_file(stream: impl IntoRawFd) -> File {
	File::from_raw_fd(stream.into_raw_fd())
}
