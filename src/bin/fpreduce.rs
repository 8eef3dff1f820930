// fpreduce -- reduce each number to a prime by iterating sum-of-prime-factors
//
// Usage: preduce [NUMBER]...
//        (reads from stdin until the sentinel value if no arguments given)

use std::io::{self, BufWriter, Write};
use std::process;
use std::sync::Arc;

use rayon::prelude::*;

use preduce_rs::common;
use preduce_rs::reduce::{self, Reduction, ReductionCache};

const TOOL_NAME: &str = "preduce";

/// Reference end-of-input marker for stdin mode.
const DEFAULT_SENTINEL: u32 = 4;

fn print_help() {
    print!(
        "Usage: {0} [OPTION]... [NUMBER]...\n\
         Reduce each NUMBER to a prime by repeatedly replacing it with the\n\
         sum of its prime factors, printing \u{2018}PRIME STEPS\u{2019} per input.\n\n\
         \x20     --precompute=N  pre-warm the result cache for 2..=N in the background\n\
         \x20     --sentinel=N    stdin value that ends input (default {1})\n\
         \x20     --help          display this help and exit\n\
         \x20     --version       output version information and exit\n\n\
         With no NUMBER arguments, values are read from standard input, one\n\
         per line, until the sentinel value or end of input. Values must be\n\
         integers in [2, 2^32).\n",
        TOOL_NAME, DEFAULT_SENTINEL
    );
}

fn print_version() {
    println!("{} (fpreduce) {}", TOOL_NAME, env!("CARGO_PKG_VERSION"));
}

/// Fatal operator error: invalid input is a configuration problem, not a
/// per-query result, so nothing is printed to stdout for it.
fn die(msg: std::fmt::Arguments) -> ! {
    eprintln!("{}: {}", TOOL_NAME, msg);
    process::exit(1);
}

/// Parse a token as a reducible input value. Anything unparseable, below 2,
/// or equal to 4 (its own prime-factor sum — the iteration would never
/// terminate) is fatal.
fn parse_value(token: &str) -> u32 {
    match token.parse::<u32>() {
        Ok(4) => die(format_args!(
            "\u{2018}4\u{2019} is its own prime-factor sum and never reduces to a prime"
        )),
        Ok(n) if n >= 2 => n,
        Ok(n) => die(format_args!(
            "\u{2018}{}\u{2019} is below 2 and has no prime reduction",
            n
        )),
        Err(_) => die(format_args!(
            "\u{2018}{}\u{2019} is not a valid integer in [2, 2^32)",
            token
        )),
    }
}

/// Parse an option argument as a plain bound (the precompute upper bound may
/// legitimately be any value >= 2; 4 only marks a slot that stays vacant).
fn parse_bound(opt: &str, v: &str) -> u32 {
    match v.parse::<u32>() {
        Ok(n) if n >= 2 => n,
        _ => die(format_args!(
            "invalid value \u{2018}{}\u{2019} for {}",
            v, opt
        )),
    }
}

/// Try to mmap stdin if it's a regular file (zero-copy, zero-allocation).
#[cfg(unix)]
fn try_mmap_stdin() -> Option<memmap2::Mmap> {
    use std::os::unix::io::FromRawFd;
    let mut stat: libc::stat = unsafe { std::mem::zeroed() };
    if unsafe { libc::fstat(0, &mut stat) } != 0
        || (stat.st_mode & libc::S_IFMT) != libc::S_IFREG
        || stat.st_size <= 0
    {
        return None;
    }
    let file = unsafe { std::fs::File::from_raw_fd(0) };
    let mmap = unsafe { memmap2::MmapOptions::new().map(&file) }.ok();
    std::mem::forget(file); // don't close stdin fd
    mmap
}

/// Collect whitespace-delimited values from a byte buffer, stopping at the
/// sentinel. Returns true if the sentinel was seen.
fn collect_tokens(input: &[u8], sentinel: u32, values: &mut Vec<u32>) -> bool {
    let mut pos = 0;
    let len = input.len();

    while pos < len {
        while pos < len && input[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= len {
            break;
        }

        let start = pos;
        while pos < len && !input[pos].is_ascii_whitespace() {
            pos += 1;
        }

        let token = std::str::from_utf8(&input[start..pos])
            .unwrap_or_else(|_| die(format_args!("input is not valid UTF-8")));
        match token.parse::<u32>() {
            Ok(n) if n == sentinel => return true,
            _ => values.push(parse_value(token)),
        }
    }
    false
}

/// Read stdin until the sentinel value or EOF. Uses mmap for file
/// redirections; falls back to chunked reads for pipes, carrying partial
/// lines across chunk boundaries.
fn collect_stdin_values(sentinel: u32) -> Vec<u32> {
    let mut values = Vec::new();

    #[cfg(unix)]
    {
        if let Some(mmap) = try_mmap_stdin() {
            collect_tokens(&mmap, sentinel, &mut values);
            return values;
        }
    }

    use std::io::Read;
    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut buf = vec![0u8; 256 * 1024];
    let mut leftover = 0usize;

    loop {
        let n = match reader.read(&mut buf[leftover..]) {
            Ok(0) => {
                if leftover > 0 {
                    collect_tokens(&buf[..leftover], sentinel, &mut values);
                }
                break;
            }
            Ok(n) => n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => die(format_args!("read error: {}", e)),
        };

        let total = leftover + n;
        // Only complete lines are parsed; the tail past the last newline is
        // carried into the next chunk.
        let boundary = match memchr::memrchr(b'\n', &buf[..total]) {
            Some(pos) => pos + 1,
            None => {
                leftover = total;
                if leftover >= buf.len() {
                    die(format_args!("input line too long"));
                }
                continue;
            }
        };

        if collect_tokens(&buf[..boundary], sentinel, &mut values) {
            return values;
        }

        let remaining = total - boundary;
        if remaining > 0 {
            buf.copy_within(boundary..total, 0);
        }
        leftover = remaining;
    }

    values
}

/// Compute all reductions in parallel, preserving input order.
fn reduce_all(values: &[u32], cache: Option<&ReductionCache>) -> Vec<Reduction> {
    let results: Result<Vec<Reduction>, _> = values
        .par_iter()
        .map(|&n| match cache {
            Some(c) => reduce::reduce_with_cache(n, c),
            None => reduce::reduce(n),
        })
        .collect();
    match results {
        Ok(r) => r,
        Err(e) => die(format_args!("{}", e)),
    }
}

/// Write one "PRIME STEPS" line per result.
fn write_results(results: &[Reduction], out: &mut BufWriter<io::StdoutLock>) {
    let mut out_buf = Vec::with_capacity(results.len() * 12 + 64);
    let mut buf = itoa::Buffer::new();
    for r in results {
        out_buf.extend_from_slice(buf.format(r.prime).as_bytes());
        out_buf.push(b' ');
        out_buf.extend_from_slice(buf.format(r.steps).as_bytes());
        out_buf.push(b'\n');
    }
    if out.write_all(&out_buf).is_err() {
        // Broken pipe or write error; exit cleanly
        process::exit(0);
    }
}

fn main() {
    common::reset_sigpipe();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut numbers: Vec<String> = Vec::new();
    let mut precompute_bound: Option<u32> = None;
    let mut sentinel = DEFAULT_SENTINEL;
    let mut saw_dashdash = false;

    for arg in &args {
        if saw_dashdash {
            numbers.push(arg.clone());
            continue;
        }
        match arg.as_str() {
            "--" => {
                saw_dashdash = true;
            }
            "--help" => {
                print_help();
                process::exit(0);
            }
            "--version" => {
                print_version();
                process::exit(0);
            }
            _ => {
                if let Some(v) = arg.strip_prefix("--precompute=") {
                    precompute_bound = Some(parse_bound("--precompute", v));
                } else if let Some(v) = arg.strip_prefix("--sentinel=") {
                    sentinel = v.parse::<u32>().unwrap_or_else(|_| {
                        die(format_args!(
                            "\u{2018}{}\u{2019} is not a valid sentinel value",
                            v
                        ))
                    });
                } else if arg.starts_with("--") {
                    eprintln!("{}: unrecognized option \u{2018}{}\u{2019}", TOOL_NAME, arg);
                    process::exit(1);
                } else {
                    numbers.push(arg.clone());
                }
            }
        }
    }

    // Start cache population before reading input so the two overlap.
    // Fire-and-forget: queries fall back to direct computation on a miss,
    // and the thread dies with the process.
    let cache = precompute_bound.map(|hi| Arc::new(ReductionCache::new(2, hi)));
    let _precompute = cache
        .as_ref()
        .map(|c| reduce::spawn_precompute(Arc::clone(c)));

    let values: Vec<u32> = if numbers.is_empty() {
        collect_stdin_values(sentinel)
    } else {
        numbers.iter().map(|s| parse_value(s)).collect()
    };

    let results = reduce_all(&values, cache.as_deref());

    let stdout = io::stdout();
    let mut out = BufWriter::with_capacity(256 * 1024, stdout.lock());
    write_results(&results, &mut out);

    if out.flush().is_err() {
        process::exit(0);
    }
}
