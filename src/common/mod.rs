/// Reset SIGPIPE to default behavior (SIG_DFL) so a closed pipe kills the
/// process (exit code 141 = 128 + 13) like traditional Unix filters.
/// Rust sets SIGPIPE to SIG_IGN by default. Must be called at the start of main().
#[inline]
pub fn reset_sigpipe() {
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}
