/// Running aggregate over score values, fed one observation at a time.
pub trait Estimator {
    fn add(&mut self, v: f64);

    /// Current value of the aggregate.
    fn estimation(&self) -> f64;

    fn add_all<I: IntoIterator<Item = f64>>(&mut self, values: I)
    where
        Self: Sized,
    {
        values.into_iter().for_each(|v| self.add(v));
    }
}
