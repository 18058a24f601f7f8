//! Containment of panics raised inside the expression engine
//!
//! The engine's parser and interpreter panic on some malformed input. Those panics are
//! caught and turned into errors, and the process-wide panic hook is told to stay silent
//! while they unwind so nothing is printed to stderr behind the caller's back.

use core::any::Any;
use core::cell::Cell;
use core::panic::UnwindSafe;
use std::panic;
use std::sync::Once;

thread_local! {
    static QUIET: Cell<bool> = const { Cell::new(false) };
}

static INSTALL_HOOK: Once = Once::new();

/// Runs `f`, converting a panic into its message without invoking the default panic output.
///
/// Panics on other threads, or outside of `f`, are reported by the previous hook as usual.
pub fn catch_quietly<R>(f: impl FnOnce() -> R + UnwindSafe) -> Result<R, String> {
    INSTALL_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !QUIET.with(Cell::get) {
                previous(info);
            }
        }));
    });

    let was_quiet = QUIET.with(|quiet| quiet.replace(true));
    let result = panic::catch_unwind(f);
    QUIET.with(|quiet| quiet.set(was_quiet));

    result.map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "expression engine panicked".to_string()
    }
}
