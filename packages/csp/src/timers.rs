// timeout channels, deduplicated by deadline.
//
// creating a timeout registers a channel under its deadline in a skip list. a later timeout whose
// deadline falls just before an existing entry's, within the resolution window, gets that entry's
// channel rather than a new one, so a burst of timeouts shares a handful of timer firings.
//
// timeout channels are generic over their value type, so an entry holds up to one channel per
// type, all of which close together when the entry fires.

use crate::{
    channel::api::{Chan, TimeoutChan},
    config::Limits,
    dispatch::Dispatcher,
    util::SkipList,
};
use std::{
    rc::Rc,
    cell::RefCell,
    time::Duration,
};
use rand_pcg::Pcg32;
use smallvec::{SmallVec, smallvec};
use tokio::time::Instant;


// deadline for durations which would overflow an Instant, about 30 years out as tokio's sleep uses.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

// channels closed by one timer firing.
struct TimerEntry {
    chans: SmallVec<[Box<dyn TimeoutChan>; 1]>,
}

impl TimerEntry {
    fn find<T: 'static>(&self) -> Option<Chan<T>> {
        self.chans
            .iter()
            .find_map(|chan| chan.as_any().downcast_ref::<Chan<T>>())
            .cloned()
    }
}

pub(crate) struct Timers(Rc<Inner>);

struct Inner {
    dispatcher: Dispatcher,
    limits: Limits,
    resolution: Duration,
    entries: RefCell<SkipList<Instant, TimerEntry>>,
}

impl Timers {
    pub(crate) fn new(
        dispatcher: Dispatcher,
        limits: Limits,
        resolution: Duration,
        rng: Pcg32,
    ) -> Self {
        Timers(Rc::new(Inner {
            dispatcher,
            limits,
            resolution,
            entries: RefCell::new(SkipList::new(rng)),
        }))
    }

    // get a channel which closes once `duration` has elapsed, or up to the resolution later.
    pub(crate) fn timeout<T: 'static>(&self, duration: Duration) -> Chan<T> {
        let now = Instant::now();
        let deadline = now.checked_add(duration).unwrap_or_else(|| now + FAR_FUTURE);
        let mut entries = self.0.entries.borrow_mut();

        if let Some((&at, entry)) = entries.ceiling_mut(&deadline) {
            // the equality case also covers a zero resolution, which must not insert a second
            // entry under the same key
            let within = deadline
                .checked_add(self.0.resolution)
                .map_or(true, |limit| at < limit);
            if within || at == deadline {
                if let Some(chan) = entry.find::<T>() {
                    return chan;
                }
                let chan = self.new_chan::<T>();
                entry.chans.push(Box::new(chan.clone()));
                trace!(chan = chan.id(), "shared timer entry with new value type");
                return chan;
            }
        }

        let chan = self.new_chan::<T>();
        entries.insert(deadline, TimerEntry {
            chans: smallvec![Box::new(chan.clone()) as Box<dyn TimeoutChan>],
        });
        let pending = entries.len();
        drop(entries);
        trace!(chan = chan.id(), ?duration, pending, "created timer");

        let inner = Rc::downgrade(&self.0);
        self.0.dispatcher.schedule_delay(
            move || {
                let Some(inner) = inner.upgrade() else { return };
                // close after the borrow ends
                let entry = inner.entries.borrow_mut().remove(&deadline);
                if let Some(entry) = entry {
                    trace!(chans = entry.chans.len(), "timer fired");
                    for chan in entry.chans {
                        chan.close();
                    }
                }
            },
            duration,
        );
        chan
    }

    fn new_chan<T: 'static>(&self) -> Chan<T> {
        Chan::unbuffered(self.0.dispatcher.clone(), self.0.limits)
    }

    // number of pending timer entries.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.0.entries.borrow().len()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test_util::{run_local, settle},
        Config,
        Runtime,
    };

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn nearby_deadlines_share_a_channel() {
        run_local(async {
            let rt = Runtime::new();
            let a = rt.timeout::<()>(ms(100));
            let b = rt.timeout::<()>(ms(100));
            let c = rt.timeout::<()>(ms(95));
            assert_eq!(a, b);
            assert_eq!(a, c);
            assert_eq!(rt.timers().len(), 1);
        });
    }

    #[test]
    fn distinct_deadlines_get_distinct_channels() {
        run_local(async {
            let rt = Runtime::new();
            let a = rt.timeout::<()>(ms(10));
            let b = rt.timeout::<()>(ms(100));
            // later than the existing entry, so can't share it
            let c = rt.timeout::<()>(ms(105));
            assert_ne!(a, b);
            assert_ne!(b, c);
            assert_eq!(rt.timers().len(), 3);

            tokio::time::sleep(ms(50)).await;
            assert!(a.is_closed());
            assert!(!b.is_closed());
            tokio::time::sleep(ms(100)).await;
            assert!(b.is_closed());
            assert!(c.is_closed());
            assert_eq!(rt.timers().len(), 0);
        });
    }

    #[test]
    fn value_types_share_an_entry() {
        run_local(async {
            let rt = Runtime::new();
            let a = rt.timeout::<u32>(ms(40));
            let b = rt.timeout::<String>(ms(40));
            let a2 = rt.timeout::<u32>(ms(40));
            assert_eq!(a, a2);
            assert_eq!(rt.timers().len(), 1);

            tokio::time::sleep(ms(50)).await;
            assert!(a.is_closed());
            assert!(b.is_closed());
        });
    }

    #[test]
    fn timeout_closes_after_deadline() {
        run_local(async {
            let rt = Runtime::new();
            let start = Instant::now();
            let t = rt.timeout::<()>(ms(30));
            assert_eq!(t.recv().await.unwrap(), None);
            let elapsed = start.elapsed();
            assert!(elapsed >= ms(30) && elapsed < ms(40));
        });
    }

    #[test]
    fn unrepresentable_deadline_clamps() {
        run_local(async {
            let rt = Runtime::new();
            let a = rt.timeout::<()>(Duration::MAX);
            let b = rt.timeout::<()>(Duration::MAX);
            assert_eq!(a, b);
            assert_eq!(rt.timers().len(), 1);
            settle().await;
            assert!(!a.is_closed());
        });
    }

    #[test]
    fn zero_resolution_dedups_only_exact_deadlines() {
        run_local(async {
            let rt = Runtime::with_config(Config::default().with_timeout_resolution(Duration::ZERO));
            let a = rt.timeout::<()>(ms(10));
            let b = rt.timeout::<()>(ms(10));
            let c = rt.timeout::<()>(ms(9));
            assert_eq!(a, b);
            assert_ne!(a, c);
            settle().await;
            tokio::time::sleep(ms(20)).await;
            assert!(a.is_closed());
            assert!(c.is_closed());
        });
    }
}
