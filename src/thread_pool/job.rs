use std::any::Any;
use std::fmt;

/// An opaque job parameter.
pub type Param = Box<dyn Any + Send>;

/// Ordered parameters handed to a job's callback.
#[derive(Default)]
pub struct Params(Vec<Param>);

impl Params {
    /// Creates an empty parameter list.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a value, builder style.
    pub fn with<T: Any + Send>(mut self, value: T) -> Self {
        self.push(value);
        self
    }

    /// Appends a value.
    pub fn push<T: Any + Send>(&mut self, value: T) {
        self.0.push(Box::new(value));
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrows the parameter at `index` if it is a `T`.
    pub fn get<T: Any>(&self, index: usize) -> Option<&T> {
        self.0.get(index)?.downcast_ref::<T>()
    }

    /// Moves the parameter at `index` out if it is a `T`.
    ///
    /// Later parameters shift down by one. On a type mismatch the
    /// parameter stays in place.
    pub fn take<T: Any>(&mut self, index: usize) -> Option<T> {
        if !self.0.get(index)?.is::<T>() {
            return None;
        }
        self.0.remove(index).downcast::<T>().ok().map(|b| *b)
    }
}

impl From<Vec<Param>> for Params {
    fn from(params: Vec<Param>) -> Self {
        Self(params)
    }
}

impl fmt::Debug for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Params").field("len", &self.0.len()).finish()
    }
}

type JobFn = Box<dyn FnOnce(Params) + Send + 'static>;

/// A unit of work: a callback plus the parameters it is invoked with.
///
/// Jobs are fire-and-forget. The pool never reports what a callback did;
/// a callback that needs to publish a result writes it somewhere itself.
pub struct Job {
    params: Params,
    func: JobFn,
}

impl Job {
    /// Builds a job from a callback that takes no parameters.
    pub fn new<F>(func: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            params: Params::new(),
            func: Box::new(move |_| func()),
        }
    }

    /// Builds a job from a callback and the parameters to call it with.
    pub fn with_params<F>(func: F, params: Params) -> Self
    where
        F: FnOnce(Params) + Send + 'static,
    {
        Self {
            params,
            func: Box::new(func),
        }
    }

    /// The parameters this job will be called with.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Runs the callback, consuming the job.
    pub(crate) fn run(self) {
        (self.func)(self.params)
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("params", &self.params).finish()
    }
}
