/// Utility macro to build a [`Task`](crate::Task) in one go, saving the
/// repetition of a `TaskBuilder` chain at the call site:
///
/// ```rust,ignore
/// let task = task!(my_env, instances: 4)?;
/// let task = task!(in my_pool, my_env, instances: 4)?;
/// ```
#[macro_export]
macro_rules! task {
    (in $pool:expr, $env:expr $(, instances: $n:expr)? $(,)?) => {
        $crate::TaskBuilder::new($env)
            .pool($pool)
            $(.instances($n))?
            .build()
    };
    ($env:expr $(, instances: $n:expr)? $(,)?) => {
        $crate::TaskBuilder::new($env)
            $(.instances($n))?
            .build()
    };
}
