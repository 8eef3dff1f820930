/// Use mimalloc as the global allocator for all binaries.
/// 2-3x faster than glibc malloc for small allocations,
/// better thread-local caching, and reduced fragmentation.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod arith;
pub mod common;
pub mod factor;
pub mod prime;
pub mod reduce;
