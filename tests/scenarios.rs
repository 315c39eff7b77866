//! End-to-end scenarios straight out of the scheduling properties table:
//! one `#[test]` per row, each with its own interpreter type so the
//! process-wide default pool and handle registry never leak state between
//! scenarios that happen to share a test binary.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use fiberpool::{Interpreter, Pool, Task, TaskBuilder};

// --- Scenario 1: single instance, FIFO order preserved -------------------

struct Incrementer;

static INCREMENTER_SEEN: OnceLock<Mutex<Vec<i32>>> = OnceLock::new();

impl Interpreter for Incrementer {
    type Env = ();
    type Message = i32;
    type Error = std::convert::Infallible;

    fn build(_env: &()) -> Self {
        Incrementer
    }

    fn call(&mut self, message: i32) -> Result<(), std::convert::Infallible> {
        INCREMENTER_SEEN
            .get_or_init(|| Mutex::new(Vec::new()))
            .lock()
            .unwrap()
            .push(message + 1);
        Ok(())
    }
}

#[test]
fn scenario_1_single_instance_preserves_receipt_order() {
    let pool = Pool::<Incrementer>::new(2);
    let task = TaskBuilder::<Incrementer>::new(())
        .pool(pool)
        .instances(1)
        .build()
        .unwrap();

    for n in 1..=100 {
        task.input().put(n).unwrap();
    }

    wait_until(Duration::from_secs(2), || {
        INCREMENTER_SEEN
            .get()
            .map(|seen| seen.lock().unwrap().len())
            .unwrap_or(0)
            == 100
    });

    let seen = INCREMENTER_SEEN.get().unwrap().lock().unwrap();
    assert_eq!(seen.len(), 100);
    let expected: Vec<i32> = (2..=101).collect();
    assert_eq!(*seen, expected);
}

// --- Scenario 2: four instances on a four-worker pool run in parallel ----

struct SleepyHandler;

static SLEEPY_DONE: OnceLock<Arc<AtomicUsize>> = OnceLock::new();

impl Interpreter for SleepyHandler {
    type Env = ();
    type Message = ();
    type Error = std::convert::Infallible;

    fn build(_env: &()) -> Self {
        SleepyHandler
    }

    fn call(&mut self, _message: ()) -> Result<(), std::convert::Infallible> {
        std::thread::sleep(Duration::from_millis(30));
        SLEEPY_DONE
            .get_or_init(|| Arc::new(AtomicUsize::new(0)))
            .fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn scenario_2_four_workers_process_eight_messages_in_parallel() {
    let pool = Pool::<SleepyHandler>::new(4);
    let task = TaskBuilder::<SleepyHandler>::new(())
        .pool(pool)
        .instances(4)
        .build()
        .unwrap();

    let start = Instant::now();
    for _ in 0..8 {
        task.input().put(()).unwrap();
    }

    wait_until(Duration::from_secs(2), || {
        SLEEPY_DONE
            .get()
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
            == 8
    });
    // serially this would take ~240ms (8 * 30ms); four-way parallelism
    // should finish in about two rounds, ~60ms. Generous upper bound to
    // keep this robust under a loaded CI box.
    assert!(
        start.elapsed() < Duration::from_millis(220),
        "took {:?}, expected parallel execution well under the serial bound",
        start.elapsed()
    );
}

// --- Scenario 3: one instance's scripted error doesn't stop its siblings -

struct FailsOnBad {
    ok_count: Arc<AtomicUsize>,
}

static FAILS_ON_BAD_OK: OnceLock<Arc<AtomicUsize>> = OnceLock::new();

impl Interpreter for FailsOnBad {
    type Env = ();
    type Message = &'static str;
    type Error = String;

    fn build(_env: &()) -> Self {
        FailsOnBad {
            ok_count: FAILS_ON_BAD_OK
                .get_or_init(|| Arc::new(AtomicUsize::new(0)))
                .clone(),
        }
    }

    fn call(&mut self, message: &'static str) -> Result<(), String> {
        if message == "bad" {
            return Err("scripted failure".to_string());
        }
        self.ok_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn handle_error(&mut self, error: String) {
        tracing::warn!(error = %error, "test error handler invoked");
    }
}

#[test]
fn scenario_3_one_instance_dies_others_keep_serving() {
    let pool = Pool::<FailsOnBad>::new(2);
    let task = TaskBuilder::<FailsOnBad>::new(())
        .pool(pool)
        .instances(2)
        .build()
        .unwrap();
    assert_eq!(task.size(), 2);

    task.input().put("ok").unwrap();
    task.input().put("bad").unwrap();
    task.input().put("ok").unwrap();

    wait_until(Duration::from_secs(2), || task.size() == 1);

    assert_eq!(task.size(), 1);
    wait_until(Duration::from_secs(2), || {
        FAILS_ON_BAD_OK.get().unwrap().load(Ordering::SeqCst) == 2
    });
    assert_eq!(FAILS_ON_BAD_OK.get().unwrap().load(Ordering::SeqCst), 2);
}

// --- Scenario 4: Pool::remove converges size() to n-k once the queue drains

#[test]
fn scenario_4_pool_drains_down_to_target_size() {
    struct Idle;
    impl Interpreter for Idle {
        type Env = ();
        type Message = ();
        type Error = std::convert::Infallible;
        fn build(_env: &()) -> Self {
            Idle
        }
        fn call(&mut self, _message: ()) -> Result<(), std::convert::Infallible> {
            Ok(())
        }
    }

    let pool = Pool::<Idle>::new(2);
    assert_eq!(pool.size(), 2);

    pool.remove(1);
    pool.remove(1);

    wait_until(Duration::from_secs(2), || pool.size() == 0);
    assert_eq!(pool.size(), 0);
}

// --- Scenario 5: two tasks sharing one input channel split the traffic --

static TALLY_A: OnceLock<Arc<Mutex<Vec<u32>>>> = OnceLock::new();
static TALLY_B: OnceLock<Arc<Mutex<Vec<u32>>>> = OnceLock::new();

struct TallyA;
impl Interpreter for TallyA {
    type Env = ();
    type Message = u32;
    type Error = std::convert::Infallible;
    fn build(_env: &()) -> Self {
        TallyA
    }
    fn call(&mut self, message: u32) -> Result<(), std::convert::Infallible> {
        TALLY_A
            .get_or_init(|| Arc::new(Mutex::new(Vec::new())))
            .lock()
            .unwrap()
            .push(message);
        Ok(())
    }
}

struct TallyB;
impl Interpreter for TallyB {
    type Env = ();
    type Message = u32;
    type Error = std::convert::Infallible;
    fn build(_env: &()) -> Self {
        TallyB
    }
    fn call(&mut self, message: u32) -> Result<(), std::convert::Infallible> {
        TALLY_B
            .get_or_init(|| Arc::new(Mutex::new(Vec::new())))
            .lock()
            .unwrap()
            .push(message);
        Ok(())
    }
}

#[test]
fn scenario_5_shared_channel_splits_traffic_without_duplication() {
    let a = TaskBuilder::<TallyA>::new(())
        .pool(Pool::new(2))
        .instances(1)
        .build()
        .unwrap();
    let b = TaskBuilder::<TallyB>::new(())
        .pool(Pool::new(2))
        .instances(1)
        .build()
        .unwrap();

    let shared_for_a = a.input();
    b.setinput(shared_for_a.clone());

    for n in 0..10 {
        shared_for_a.put(n).unwrap();
    }

    wait_until(Duration::from_secs(2), || {
        let a_len = TALLY_A.get().map(|v| v.lock().unwrap().len()).unwrap_or(0);
        let b_len = TALLY_B.get().map(|v| v.lock().unwrap().len()).unwrap_or(0);
        a_len + b_len == 10
    });

    let mut all: Vec<u32> = TALLY_A
        .get()
        .unwrap()
        .lock()
        .unwrap()
        .iter()
        .chain(TALLY_B.get().unwrap().lock().unwrap().iter())
        .copied()
        .collect();
    all.sort_unstable();
    assert_eq!(all, (0..10).collect::<Vec<u32>>());
}

// --- Scenario 6: a Task built from inside a running Instance inherits the
// outer Task as its automatic parent -------------------------------------

struct Spawner;

static SPAWNER_CHILD_PARENT: OnceLock<Mutex<Option<Arc<Task<Spawner>>>>> = OnceLock::new();

impl Interpreter for Spawner {
    type Env = ();
    type Message = ();
    type Error = std::convert::Infallible;

    fn build(_env: &()) -> Self {
        Spawner
    }

    fn call(&mut self, _message: ()) -> Result<(), std::convert::Infallible> {
        let child = TaskBuilder::<Spawner>::new(()).build().unwrap();
        *SPAWNER_CHILD_PARENT
            .get_or_init(|| Mutex::new(None))
            .lock()
            .unwrap() = child.parent();
        Ok(())
    }
}

#[test]
fn scenario_6_task_built_from_inside_an_instance_inherits_its_parent() {
    let outer = TaskBuilder::<Spawner>::new(())
        .pool(Pool::new(1))
        .instances(1)
        .build()
        .unwrap();
    outer.input().put(()).unwrap();

    wait_until(Duration::from_secs(2), || {
        SPAWNER_CHILD_PARENT
            .get()
            .map(|m| m.lock().unwrap().is_some())
            .unwrap_or(false)
    });

    let parent = SPAWNER_CHILD_PARENT
        .get()
        .unwrap()
        .lock()
        .unwrap()
        .clone()
        .expect("child task should have resolved a parent");
    assert!(Arc::ptr_eq(&parent, &outer));
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) {
    let start = Instant::now();
    while !condition() {
        if start.elapsed() > timeout {
            panic!("condition did not become true within {:?}", timeout);
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}
