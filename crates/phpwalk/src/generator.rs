//! Generator coroutines, implemented as a dedicated OS
//! thread synchronized with its caller over a rendezvous channel pair,
//! rather than an explicit resumable frame-stack state machine.
//!
//! The body thread and whichever thread is resuming it alternate
//! strictly: the side that is not currently running is always blocked
//! on a zero-capacity `sync_channel` recv. That strict hand-off is what
//! makes moving the evaluator's non-`Send` state (`Rc<RefCell<_>>` all
//! the way down) across the thread boundary sound even though nothing
//! here is genuinely `Sync`: there is never a moment where both threads
//! can observe the shared graph at once. [`Baton`] is the one unsafe
//! seam that relies on that invariant; nothing outside this module
//! needs to know it exists.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread::JoinHandle;

use crate::control::{Control, RunResult};
use crate::errors::ThrowPayload;
use crate::value::Value;

struct Baton<T>(T);

// SAFETY: a `Baton`'s payload only ever crosses the thread boundary at
// the two rendezvous points in `spawn`/`yield_value` below, where the
// sending side has already committed to blocking on its own `recv`
// before the other side can observe the value. The two threads never
// run concurrently against the payload's data — that is the whole
// point of the zero-capacity channel pair — so the property `Send`
// normally guards (no unsynchronized concurrent access) already holds
// by construction.
unsafe impl<T> Send for Baton<T> {}

pub enum ResumeMsg {
    Next(Value),
    Throw(ThrowPayload),
    Close,
}

enum YieldMsg {
    Yielded(Value, Value),
    Returned(Value),
    Threw(ThrowPayload),
    Exited(Option<i32>),
}

/// The channel pair handed to the body thread. `yield_value` reads this
/// out of the thread-local [`CHANNEL`] to perform its blocking
/// send/recv inline with ordinary evaluation — the evaluator itself
/// needs no "am I inside a generator" parameter threaded through every
/// call; it just calls `yield_value` from wherever `Expr::Yield` is.
struct BodyChannel {
    to_caller: SyncSender<Baton<YieldMsg>>,
    from_caller: Receiver<Baton<ResumeMsg>>,
    auto_key: Cell<i64>,
}

thread_local! {
    static CHANNEL: RefCell<Option<BodyChannel>> = const { RefCell::new(None) };
}

/// Suspends the currently running generator body, handing `value`
/// (with `key`, or the next auto-incrementing integer key if `None`)
/// back to whoever called `next()`/`current()`, and blocks until
/// resumed. Panics if called outside a generator body thread — that
/// would mean `Expr::Yield` was reached while evaluating code that
/// wasn't scanned as a generator body, which is a registration bug,
/// not a runtime condition a script can trigger.
pub fn yield_value(key: Option<Value>, value: Value) -> RunResult<Value> {
    CHANNEL.with(|c| {
        let borrow = c.borrow();
        let channel = borrow.as_ref().expect("yield_value called outside a generator body thread");
        let key = key.unwrap_or_else(|| {
            let k = channel.auto_key.get();
            channel.auto_key.set(k + 1);
            Value::Int(k)
        });
        if channel.to_caller.send(Baton(YieldMsg::Yielded(key, value))).is_err() {
            return Err(Control::Exit(None));
        }
        match channel.from_caller.recv() {
            Ok(Baton(ResumeMsg::Next(sent))) => Ok(sent),
            Ok(Baton(ResumeMsg::Throw(payload))) => Err(Control::Exception(payload)),
            Ok(Baton(ResumeMsg::Close)) | Err(_) => Err(Control::Exit(None)),
        }
    })
}

pub fn is_inside_generator_body() -> bool {
    CHANNEL.with(|c| c.borrow().is_some())
}

struct GeneratorState {
    to_body: SyncSender<Baton<ResumeMsg>>,
    from_body: Receiver<Baton<YieldMsg>>,
    handle: Option<JoinHandle<()>>,
    started: bool,
    finished: bool,
    current_key: Value,
    current_value: Value,
    return_value: Value,
}

pub type GeneratorHandle = Rc<RefCell<GeneratorState>>;

/// Spawns `body` on a dedicated OS thread, returning a suspended
/// generator handle that has not yet executed any of `body`.
pub fn spawn(body: impl FnOnce() -> RunResult<Value> + 'static) -> GeneratorHandle {
    let (to_body, from_caller) = sync_channel::<Baton<ResumeMsg>>(0);
    let (to_caller, from_body) = sync_channel::<Baton<YieldMsg>>(0);

    let payload = Baton((body, BodyChannel { to_caller, from_caller, auto_key: Cell::new(0) }));
    let handle = std::thread::spawn(move || {
        let Baton((body, channel)) = payload;
        match channel.from_caller.recv() {
            Ok(Baton(ResumeMsg::Next(_))) => {}
            Ok(Baton(ResumeMsg::Throw(_)) | Baton(ResumeMsg::Close)) | Err(_) => return,
        }
        let to_caller = channel.to_caller.clone();
        CHANNEL.with(|c| *c.borrow_mut() = Some(channel));
        let result = body();
        CHANNEL.with(|c| *c.borrow_mut() = None);
        let msg = match result {
            Ok(v) => YieldMsg::Returned(v),
            Err(Control::Exception(payload)) => YieldMsg::Threw(payload),
            Err(Control::Exit(code)) => YieldMsg::Exited(code),
            // break/continue/return can't escape a function body; any
            // such result reaching here is treated as a plain return
            // of no value rather than propagated as a control error.
            Err(_) => YieldMsg::Returned(Value::Null),
        };
        let _ = to_caller.send(Baton(msg));
    });

    Rc::new(RefCell::new(GeneratorState {
        to_body,
        from_body,
        handle: Some(handle),
        started: false,
        finished: false,
        current_key: Value::Null,
        current_value: Value::Null,
        return_value: Value::Null,
    }))
}

fn resume(state: &mut GeneratorState, msg: ResumeMsg) -> RunResult<()> {
    if state.finished {
        return Ok(());
    }
    state.started = true;
    if state.to_body.send(Baton(msg)).is_err() {
        state.finished = true;
        return Ok(());
    }
    match state.from_body.recv() {
        Ok(Baton(YieldMsg::Yielded(k, v))) => {
            state.current_key = k;
            state.current_value = v;
            Ok(())
        }
        Ok(Baton(YieldMsg::Returned(v))) => {
            state.finished = true;
            state.return_value = v;
            state.current_key = Value::Null;
            state.current_value = Value::Null;
            Ok(())
        }
        Ok(Baton(YieldMsg::Threw(payload))) => {
            state.finished = true;
            Err(Control::Exception(payload))
        }
        Ok(Baton(YieldMsg::Exited(code))) => {
            state.finished = true;
            Err(Control::Exit(code))
        }
        Err(_) => {
            state.finished = true;
            Ok(())
        }
    }
}

pub fn rewind(handle: &GeneratorHandle) -> RunResult<()> {
    let mut state = handle.borrow_mut();
    if !state.started {
        resume(&mut state, ResumeMsg::Next(Value::Null))?;
    }
    Ok(())
}

pub fn valid(handle: &GeneratorHandle) -> RunResult<bool> {
    rewind(handle)?;
    Ok(!handle.borrow().finished)
}

pub fn current(handle: &GeneratorHandle) -> RunResult<Value> {
    rewind(handle)?;
    Ok(handle.borrow().current_value.clone())
}

pub fn current_key(handle: &GeneratorHandle) -> RunResult<Value> {
    rewind(handle)?;
    Ok(handle.borrow().current_key.clone())
}

pub fn advance(handle: &GeneratorHandle) -> RunResult<()> {
    rewind(handle)?;
    resume(&mut handle.borrow_mut(), ResumeMsg::Next(Value::Null))
}

pub fn send(handle: &GeneratorHandle, value: Value) -> RunResult<Value> {
    rewind(handle)?;
    resume(&mut handle.borrow_mut(), ResumeMsg::Next(value))?;
    Ok(handle.borrow().current_value.clone())
}

pub fn throw_into(handle: &GeneratorHandle, payload: ThrowPayload) -> RunResult<Value> {
    rewind(handle)?;
    resume(&mut handle.borrow_mut(), ResumeMsg::Throw(payload))?;
    Ok(handle.borrow().current_value.clone())
}

pub fn get_return(handle: &GeneratorHandle) -> Value {
    handle.borrow().return_value.clone()
}

impl Drop for GeneratorState {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.to_body.send(Baton(ResumeMsg::Close));
        }
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_does_not_run_body_until_first_resume() {
        let ran = Rc::new(Cell::new(false));
        let ran2 = ran.clone();
        let gen = spawn(move || {
            ran2.set(true);
            Ok(Value::Null)
        });
        assert!(!ran.get());
        advance(&gen).unwrap();
        assert!(ran.get());
    }

    #[test]
    fn yield_roundtrips_a_value_out_and_a_sent_value_back_in() {
        let gen = spawn(|| {
            let got = yield_value(None, Value::Int(1))?;
            let n = match got {
                Value::Int(n) => n,
                _ => 0,
            };
            Ok(Value::Int(n + 100))
        });
        assert!(valid(&gen).unwrap());
        assert!(matches!(current(&gen).unwrap(), Value::Int(1)));
        assert!(matches!(current_key(&gen).unwrap(), Value::Int(0)));
        send(&gen, Value::Int(41)).ok();
        assert!(!valid(&gen).unwrap());
        assert!(matches!(get_return(&gen), Value::Int(141)));
    }

    #[test]
    fn auto_keys_increment_across_yields() {
        let gen = spawn(|| {
            yield_value(None, Value::Int(10))?;
            yield_value(None, Value::Int(20))?;
            Ok(Value::Null)
        });
        advance(&gen).unwrap();
        assert!(matches!(current_key(&gen).unwrap(), Value::Int(0)));
        advance(&gen).unwrap();
        assert!(matches!(current_key(&gen).unwrap(), Value::Int(1)));
    }
}
