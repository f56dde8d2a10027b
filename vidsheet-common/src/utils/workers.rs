use std::{any::Any, fmt, thread};

// NOTE: the lifetimes mirror the ones on `thread::scope`. `'work_scope` is on the struct
// itself since it can't be borrowed for `'scope`.
pub struct WorkerScope<'scope, 'env, T> {
    inner: &'scope thread::Scope<'scope, 'env>,
    handles: Vec<(String, thread::ScopedJoinHandle<'scope, T>)>,
}

impl<'work_scope, 'scope, 'env, T> WorkerScope<'scope, 'env, T> {
    /// Spawns a named worker, the name gets a running index appended.
    pub fn spawn<F>(&'work_scope mut self, name: impl AsRef<str>, f: F)
    where
        F: FnOnce() -> T + Send + 'scope,
        T: Send + 'scope,
    {
        let name = name.as_ref();
        let index = self.num_spawned();
        let name = format!("{name}{index:>02}");
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn_scoped(self.inner, f)
            .expect("the name does not contain null bytes");
        self.handles.push((name, handle));
    }

    pub fn num_spawned(&self) -> usize {
        self.handles.len()
    }
}

pub struct CaughtPanic(pub Box<dyn Any + Send + 'static>);

pub struct FinishedWorker<T> {
    pub name: String,
    pub result: Result<T, CaughtPanic>,
}

/// Runs `f` which may spawn any number of workers, and waits for all of them. A
/// panicking worker does not take the others down with it.
pub fn scoped_workers<'env, F, T>(f: F) -> Vec<FinishedWorker<T>>
where
    F: for<'scope, 'work_scope> FnOnce(&'work_scope mut WorkerScope<'scope, 'env, T>),
{
    thread::scope(|scope| {
        let mut scope = WorkerScope {
            inner: scope,
            handles: vec![],
        };
        f(&mut scope);
        scope
            .handles
            .into_iter()
            .map(|(name, handle)| FinishedWorker {
                name,
                result: handle.join().map_err(CaughtPanic),
            })
            .collect()
    })
}

impl fmt::Display for CaughtPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let panic = &self.0;
        let string = panic
            .downcast_ref::<String>()
            .cloned()
            .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
            .unwrap_or_else(|| {
                format!("non-string panic message: {:?}", panic.type_id())
            });
        write!(f, "{string}")
    }
}
