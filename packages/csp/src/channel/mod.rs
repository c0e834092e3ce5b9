// implementation of channels.
//
// the architecture is as such:
//
// channel handles wrap around Rc<core>
//                                |
//          /---------------------/
//          v
//        core
//          |
//          |------ an optional Buffer, the policy object that decides whether a put can complete
//          |       without a taker. values reach it through the optional Transform.
//          |
//          |------ a "takes queue": a RingBuffer of parked take handlers. handlers racing in an
//          |       alts may become stale while parked, so the queue is compacted every so often
//          |       (see the dirty counters).
//          |
//          \------ a "puts queue", which is the same idea for put handlers, each paired with the
//                  value it's putting.
//
// nothing in core calls a continuation directly. completing a parked operation schedules its
// continuation on the dispatcher. the ex-handler is called directly, but with core's state borrow
// released, so it may use its own channel. transforms are the one piece of user code which runs
// with the state borrowed: they only ever see the buffer.
//
// the organization of these modules is as such:
//
//      core: the rendezvous engine. returns synchronous results and parks handlers.
//       ^
//       |
//      api: wrapper around core exposing Chan, its builder, and the callback-style and
//           future-style operations built on top of handlers.

pub(crate) mod api;

mod core;

pub use self::core::ExHandler;
