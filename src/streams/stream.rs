use crate::core::instances::Instance;
use crate::error::{EvalError, Result};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Iterator handed out by [`Stream::iter`]. Errors surface lazily, on the
/// item that failed.
pub type InstanceIter = Box<dyn Iterator<Item = Result<Instance>>>;

type Producer = Rc<dyn Fn() -> Result<InstanceIter>>;

/// Lazy, finite sequence of [`Instance`]s.
///
/// A stream owns a production function that is invoked once per iteration.
/// Streams built in *copying* mode may be iterated any number of times, each
/// consumer getting an independent cursor. Other streams are single-pass: a
/// second call to [`iter`](Stream::iter) fails with
/// [`EvalError::StreamConsumed`].
///
/// Transformations (`map_instances`, `filter_instances`, ...) never touch the
/// data; they wrap the production function and run when the resulting stream
/// is iterated.
#[derive(Clone)]
pub struct Stream {
    producer: Producer,
    copying: bool,
    consumed: Rc<Cell<bool>>,
}

impl Stream {
    /// Wraps a generator. With `copying = true` the generator must be
    /// restartable, i.e. yield the same sequence every time it is called.
    pub fn from_generator<F>(generator: F, copying: bool) -> Self
    where
        F: Fn() -> Result<InstanceIter> + 'static,
    {
        Self {
            producer: Rc::new(generator),
            copying,
            consumed: Rc::new(Cell::new(false)),
        }
    }

    /// Wraps an in-memory sequence.
    pub fn from_instances(instances: Vec<Instance>, copying: bool) -> Self {
        if copying {
            let data = Rc::new(instances);
            Self::from_generator(move || Ok(replay(Rc::clone(&data))), true)
        } else {
            let slot = RefCell::new(Some(instances));
            Self::from_generator(
                move || {
                    let instances = slot.borrow_mut().take().unwrap_or_default();
                    Ok(Box::new(instances.into_iter().map(Ok)) as InstanceIter)
                },
                false,
            )
        }
    }

    /// Wraps an arbitrary iterator; the result is always single-pass.
    pub fn single_pass<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Instance>,
        I::IntoIter: 'static,
    {
        let slot = RefCell::new(Some(iter.into_iter()));
        Self::from_generator(
            move || match slot.borrow_mut().take() {
                Some(it) => Ok(Box::new(it.map(Ok)) as InstanceIter),
                None => Ok(Box::new(std::iter::empty()) as InstanceIter),
            },
            false,
        )
    }

    pub fn is_copying(&self) -> bool {
        self.copying
    }

    /// Starts a new pass over the stream.
    pub fn iter(&self) -> Result<InstanceIter> {
        if !self.copying && self.consumed.replace(true) {
            return Err(EvalError::StreamConsumed);
        }
        (self.producer)()
    }

    /// Runs one full pass and collects it, stopping at the first error.
    pub fn collect_instances(&self) -> Result<Vec<Instance>> {
        self.iter()?.collect()
    }

    pub fn map_instances<F>(self, f: F) -> Stream
    where
        F: Fn(Instance) -> Result<Instance> + 'static,
    {
        let copying = self.copying;
        let f = Rc::new(f);
        Self::from_generator(
            move || {
                let f = Rc::clone(&f);
                let iter = self.iter()?;
                Ok(Box::new(iter.map(move |item| item.and_then(|instance| (*f)(instance))))
                    as InstanceIter)
            },
            copying,
        )
    }

    pub fn filter_instances<P>(self, predicate: P) -> Stream
    where
        P: Fn(&Instance) -> Result<bool> + 'static,
    {
        let copying = self.copying;
        let predicate = Rc::new(predicate);
        Self::from_generator(
            move || {
                let predicate = Rc::clone(&predicate);
                let iter = self.iter()?;
                Ok(Box::new(iter.filter_map(move |item| match item {
                    Ok(instance) => match (*predicate)(&instance) {
                        Ok(true) => Some(Ok(instance)),
                        Ok(false) => None,
                        Err(e) => Some(Err(e)),
                    },
                    Err(e) => Some(Err(e)),
                })) as InstanceIter)
            },
            copying,
        )
    }

    pub fn take_instances(self, n: usize) -> Stream {
        let copying = self.copying;
        Self::from_generator(
            move || Ok(Box::new(self.iter()?.take(n)) as InstanceIter),
            copying,
        )
    }

    pub fn skip_instances(self, n: usize) -> Stream {
        let copying = self.copying;
        Self::from_generator(
            move || Ok(Box::new(self.iter()?.skip(n)) as InstanceIter),
            copying,
        )
    }

    /// Concatenates two streams; restartable only if both are.
    pub fn chain(self, other: Stream) -> Stream {
        let copying = self.copying && other.copying;
        Self::from_generator(
            move || Ok(Box::new(self.iter()?.chain(other.iter()?)) as InstanceIter),
            copying,
        )
    }

    /// Applies a transformation that needs the whole sequence at once.
    ///
    /// Materialization happens when the returned stream is iterated, not
    /// here, and is repeated on every pass of a copying stream.
    pub fn transform_all<F>(self, f: F) -> Stream
    where
        F: Fn(Vec<Instance>) -> Result<Vec<Instance>> + 'static,
    {
        let copying = self.copying;
        Self::from_generator(
            move || {
                let out = f(self.collect_instances()?)?;
                Ok(Box::new(out.into_iter().map(Ok)) as InstanceIter)
            },
            copying,
        )
    }

    /// Turns any stream into a copying one. The first pass materializes the
    /// source; later passes replay the cached instances.
    pub fn cached(self) -> Stream {
        let cache: RefCell<Option<Rc<Vec<Instance>>>> = RefCell::new(None);
        Self::from_generator(
            move || {
                let existing = cache.borrow().clone();
                let data = match existing {
                    Some(data) => data,
                    None => {
                        let data = Rc::new(self.collect_instances()?);
                        *cache.borrow_mut() = Some(Rc::clone(&data));
                        data
                    }
                };
                Ok(replay(data))
            },
            true,
        )
    }
}

fn replay(data: Rc<Vec<Instance>>) -> InstanceIter {
    let len = data.len();
    Box::new((0..len).map(move |i| Ok(data[i].clone())))
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("copying", &self.copying)
            .field("consumed", &self.consumed.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn numbered(n: usize) -> Vec<Instance> {
        (0..n).map(|i| Instance::new().with("x", i)).collect()
    }

    fn xs(instances: &[Instance]) -> Vec<u64> {
        instances.iter().map(|i| i.get("x").and_then(|v| v.as_u64()).unwrap()).collect()
    }

    #[test]
    fn copying_stream_restarts() {
        let s = Stream::from_instances(numbered(3), true);
        assert_eq!(xs(&s.collect_instances().unwrap()), vec![0, 1, 2]);
        assert_eq!(xs(&s.collect_instances().unwrap()), vec![0, 1, 2]);
    }

    #[test]
    fn single_pass_stream_fails_on_second_iteration() {
        let s = Stream::from_instances(numbered(2), false);
        assert_eq!(s.collect_instances().unwrap().len(), 2);
        assert!(matches!(s.iter(), Err(EvalError::StreamConsumed)));
    }

    #[test]
    fn independent_cursors_on_copying_stream() {
        let s = Stream::from_instances(numbered(3), true);
        let mut a = s.iter().unwrap();
        let mut b = s.iter().unwrap();
        a.next();
        a.next();
        let first_b = b.next().unwrap().unwrap();
        assert_eq!(first_b.get("x"), Some(&json!(0)));
        assert_eq!(a.next().unwrap().unwrap().get("x"), Some(&json!(2)));
    }

    #[test]
    fn map_is_lazy() {
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        let s = Stream::from_instances(numbered(4), true).map_instances(move |i| {
            seen.set(seen.get() + 1);
            Ok(i)
        });
        assert_eq!(calls.get(), 0);
        let mut it = s.iter().unwrap();
        it.next();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn filter_take_skip_compose() {
        let s = Stream::from_instances(numbered(10), true)
            .filter_instances(|i| Ok(i.get("x").and_then(|v| v.as_u64()).unwrap() % 2 == 0))
            .skip_instances(1)
            .take_instances(2);
        assert_eq!(xs(&s.collect_instances().unwrap()), vec![2, 4]);
    }

    #[test]
    fn errors_surface_on_the_failing_item() {
        let s = Stream::from_instances(numbered(3), true).map_instances(|i| {
            if i.get("x") == Some(&json!(1)) {
                Err(EvalError::format("bad x"))
            } else {
                Ok(i)
            }
        });
        let items: Vec<_> = s.iter().unwrap().collect();
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
        assert!(items[2].is_ok());
    }

    #[test]
    fn cached_makes_single_pass_restartable() {
        let s = Stream::single_pass(numbered(3)).cached();
        assert!(s.is_copying());
        assert_eq!(s.collect_instances().unwrap().len(), 3);
        assert_eq!(s.collect_instances().unwrap().len(), 3);
    }

    #[test]
    fn chain_is_copying_only_if_both_are() {
        let a = Stream::from_instances(numbered(1), true);
        let b = Stream::from_instances(numbered(2), false);
        let c = a.clone().chain(b);
        assert!(!c.is_copying());
        assert_eq!(c.collect_instances().unwrap().len(), 3);
        let d = a.clone().chain(a);
        assert!(d.is_copying());
    }

    #[test]
    fn transform_all_sees_whole_sequence() {
        let s = Stream::from_instances(numbered(3), true).transform_all(|mut all| {
            all.reverse();
            Ok(all)
        });
        assert_eq!(xs(&s.collect_instances().unwrap()), vec![2, 1, 0]);
    }
}
