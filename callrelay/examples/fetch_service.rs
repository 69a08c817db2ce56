//! Fetch Service Example
//!
//! Drives a small service through its dependency calls, one step at a time.
//!
//! # Key Concepts Demonstrated
//!
//! ## 1. Stand-ins behind a trait
//!
//! The service talks to storage through the `Store` trait. In the test the
//! trait is implemented by `RelayStore`, which forwards every method to a
//! [`StandIn`]. The service can't tell the difference.
//!
//! ## 2. Ordered and eventually matching
//!
//! `rename` reads, then writes and logs concurrently. The read is asserted
//! in order; the write and log calls race, so they are claimed with
//! `eventually` in whichever order is convenient.
//!
//! ## 3. Injected failures
//!
//! The second run injects a panic into `Store.put` and asserts that it
//! surfaces as the service's own outcome.

use std::{future::Future, time::Duration};

use callrelay::*;

trait Store: Send + Sync + 'static {
    fn get(&self, id: String) -> impl Future<Output = (String, Option<String>)> + Send;
    fn put(&self, id: String, value: String) -> impl Future<Output = ()> + Send;
}

trait Log: Send + Sync + 'static {
    fn write(&self, line: String) -> impl Future<Output = ()> + Send;
}

/// Code under test: rename an item and record what happened.
async fn rename<S: Store, L: Log>(store: &S, log: &L, id: String, suffix: &str) -> (bool,) {
    let (current, err) = store.get(id.clone()).await;
    if err.is_some() {
        return (false,);
    }
    let renamed = format!("{current}{suffix}");
    tokio::join!(
        store.put(id.clone(), renamed.clone()),
        log.write(format!("{id} -> {renamed}")),
    );
    (true,)
}

struct RelayStore {
    get: StandIn,
    put: StandIn,
}

impl Store for RelayStore {
    async fn get(&self, id: String) -> (String, Option<String>) {
        self.get.invoke((id,)).await
    }

    async fn put(&self, id: String, value: String) {
        self.put.invoke::<()>((id, value)).await
    }
}

struct RelayLog(StandIn);

impl Log for RelayLog {
    async fn write(&self, line: String) {
        self.0.invoke::<()>((line,)).await
    }
}

#[tokio::main]
async fn main() -> Result {
    let mut test = Harness::new(
        HarnessConfig::default().with_default_timeout(Duration::from_millis(500)),
    );

    let store = std::sync::Arc::new(RelayStore {
        get: test.mimic(Dependency::method::<(String,), (String, Option<String>)>("Store", "get"))?,
        put: test.mimic(Dependency::method::<(String, String), ()>("Store", "put"))?,
    });
    let log = std::sync::Arc::new(RelayLog(
        test.mimic(Dependency::method::<(String,), ()>("Log", "write"))?,
    ));

    let target = Target::from_fn("rename", move |(id,): (String,)| {
        let (store, log) = (store.clone(), log.clone());
        async move { rename(&*store, &*log, id, "-v2").await }
    });

    // Happy path.
    let handle = test.start(&target, (String::from("42"),));

    let get = test
        .expect_call("Store.get")
        .with_args((String::from("42"),))
        .await?;
    println!("matched {get}");
    get.inject_return((String::from("draft"), None::<String>))?;

    let log_line = test
        .eventually()
        .expect_call("Log.write")
        .matching(vec![Matcher::by("mentions the new name", |line: &String| {
            line.ends_with("draft-v2")
        })])
        .await?;
    let put = test
        .eventually()
        .expect_call("Store.put")
        .with_args((String::from("42"), String::from("draft-v2")))
        .await?;
    println!("matched {log_line} and {put}");
    log_line.inject_return(())?;
    put.inject_return(())?;

    let outcome = handle.expect_return((true,)).await?;
    println!("rename finished: {outcome}");

    // Storage failure while writing.
    let handle = test.start(&target, (String::from("7"),));
    test.expect_call("Store.get")
        .await?
        .inject_return((String::from("old"), None::<String>))?;
    let put = test.eventually().expect_call("Store.put").await?;
    // Answer the log first: once the put panics, the log write is abandoned.
    test.eventually().expect_call("Log.write").await?.inject_return(())?;
    put.inject_panic(String::from("disk full"))?;

    let outcome = handle.expect_panic_equals(String::from("disk full")).await?;
    println!("rename failed as expected: {outcome}");

    test.expect_no_calls()
        .within(Duration::from_millis(50))
        .await?;
    test.dump();
    Ok(())
}
