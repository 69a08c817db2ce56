use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    time::Duration,
};

use callrelay::{
    CallTarget, Dependency, Error, Harness, HarnessConfig, Matcher, Opaque, Outcome, Signature,
    StandIn, Target, Value, Values,
};

fn harness() -> Harness {
    Harness::new(
        HarnessConfig::default()
            .with_default_timeout(Duration::from_millis(500))
            .with_response_timeout(Duration::from_secs(2)),
    )
}

type Entries = Vec<(u8, Option<String>)>;

fn get_dependency() -> Dependency {
    Dependency::method::<(String,), (String, Option<String>)>("Store", "get")
}

/// Calls `Store.get` once and hands back whatever it returned.
fn fetch(get: StandIn) -> Target {
    Target::from_fn("fetch", move |(id,): (String,)| {
        let get = get.clone();
        async move { get.invoke::<(String, Option<String>)>((id,)).await }
    })
}

#[tokio::test]
async fn get_returns_injected_values() -> callrelay::Result {
    let mut test = harness();
    let get = test.mimic(get_dependency())?;
    let handle = test.start(&fetch(get), (String::from("42"),));

    let call = test
        .expect_call("Store.get")
        .with_args((String::from("42"),))
        .await?;
    call.inject_return((String::from("hello"), None::<String>))?;

    handle
        .expect_return((String::from("hello"), None::<String>))
        .await?;
    Ok(())
}

#[tokio::test]
async fn round_trip_preserves_nested_and_empty_values() -> callrelay::Result {
    let mut test = harness();
    let lookup = test.mimic(Dependency::of::<(), (Option<String>, Entries)>("Lookup"))?;
    let target = Target::from_fn("relay_lookup", move |(): ()| {
        let lookup = lookup.clone();
        async move { lookup.invoke::<(Option<String>, Entries)>(()).await }
    });
    let handle = test.start(&target, ());

    let entries: Entries = vec![(1, Some(String::from("a"))), (2, None)];
    test.expect_call("Lookup")
        .await?
        .inject_return((None::<String>, entries.clone()))?;

    let outcome = handle.expect_return((None::<String>, entries)).await?;
    assert!(outcome.is_return());
    Ok(())
}

#[tokio::test]
async fn concurrent_starts_resolve_independently() -> callrelay::Result {
    let mut test = harness();
    let ask = test.mimic(Dependency::of::<(u32,), (u32,)>("Ask"))?;
    let target = Target::from_fn("ask_once", move |(n,): (u32,)| {
        let ask = ask.clone();
        async move { ask.invoke::<(u32,)>((n,)).await }
    });

    let first = test.start(&target, (1_u32,));
    let second = test.start(&target, (2_u32,));
    assert_ne!(first.id(), second.id());

    test.eventually()
        .expect_call("Ask")
        .with_args((2_u32,))
        .await?
        .inject_return((20_u32,))?;
    second.expect_return((20_u32,)).await?;
    assert!(!first.is_finished());

    test.eventually()
        .expect_call("Ask")
        .with_args((1_u32,))
        .await?
        .inject_return((10_u32,))?;
    first.expect_return((10_u32,)).await?;
    second.expect_return((20_u32,)).await?;
    Ok(())
}

#[tokio::test]
async fn second_response_always_fails() -> callrelay::Result {
    let mut test = harness();
    let get = test.mimic(get_dependency())?;
    let target = fetch(get);
    let first = test.start(&target, (String::from("1"),));

    let call = test.expect_call("Store.get").await?;
    call.inject_return((String::from("one"), None::<String>))?;
    let late_panic = catch_unwind(AssertUnwindSafe(|| call.inject_panic(String::from("late"))));
    assert!(late_panic.is_err());
    first
        .expect_return((String::from("one"), None::<String>))
        .await?;

    let second = test.start(&target, (String::from("2"),));
    let call = test.expect_call("Store.get").await?;
    call.inject_panic(String::from("first"))?;
    let late_return = catch_unwind(AssertUnwindSafe(|| {
        call.inject_return((String::from("two"), None::<String>))
    }));
    assert!(late_return.is_err());
    second.expect_panic_equals(String::from("first")).await?;
    Ok(())
}

#[tokio::test]
async fn ordered_mode_reports_the_call_that_actually_came() -> callrelay::Result {
    let mut test = harness();
    let a = test.mimic(Dependency::of::<(), ()>("A"))?;
    let b = test.mimic(Dependency::of::<(), ()>("B"))?;
    let target = Target::from_fn("a_then_b", move |(): ()| {
        let (a, b) = (a.clone(), b.clone());
        async move {
            a.call(()).await;
            b.call(()).await;
        }
    });
    let handle = test.start(&target, ());

    let err = test.expect_call("B").await.unwrap_err();
    match &err {
        Error::WrongCall { expected, actual } => {
            assert_eq!(expected, "B(..)");
            assert_eq!(actual, "A()");
        }
        other => panic!("expected WrongCall, got {other:?}"),
    }

    test.expect_call("A").await?.inject_return(())?;
    test.expect_call("B").await?.inject_return(())?;
    handle.expect_return(()).await?;
    test.expect_no_calls()
        .within(Duration::from_millis(20))
        .await?;
    Ok(())
}

#[tokio::test]
async fn eventually_matches_calls_in_reverse_arrival_order() -> callrelay::Result {
    let mut test = harness();
    let x = test.mimic(Dependency::of::<(), (u8,)>("X"))?;
    let y = test.mimic(Dependency::of::<(), (u8,)>("Y"))?;
    let target = Target::from_fn("fan_out", move |(): ()| {
        let (x, y) = (x.clone(), y.clone());
        async move {
            let ((vx,), (vy,)) = tokio::join!(x.invoke::<(u8,)>(()), y.invoke::<(u8,)>(()));
            (vx + vy,)
        }
    });
    let handle = test.start(&target, ());

    let y_call = test.eventually().expect_call("Y").await?;
    let x_call = test.eventually().expect_call("X").await?;
    assert_eq!(x_call.target().as_str(), "X");
    assert_eq!(y_call.target().as_str(), "Y");
    assert_eq!(test.pending_calls(), 0);

    y_call.inject_return((2_u8,))?;
    x_call.inject_return((3_u8,))?;
    handle.expect_return((5_u8,)).await?;

    // Claimed calls are gone for good.
    let err = test
        .eventually()
        .expect_call("X")
        .within(Duration::from_millis(20))
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    Ok(())
}

#[tokio::test]
async fn return_values_are_checked_for_shape() -> callrelay::Result {
    let test = harness();
    let target = Target::from_fn("five", |(): ()| async { (5_i32, String::from("five")) });
    let handle = test.start(&target, ());

    handle.expect_return((5_i32, String::from("five"))).await?;
    let err = handle.expect_return((5_i32,)).await.unwrap_err();
    assert!(err.to_string().contains("wrong number of returns"), "{err}");
    Ok(())
}

#[tokio::test]
async fn unanswered_call_fails_with_timeout() -> callrelay::Result {
    let mut test = harness();
    let get = test.mimic(get_dependency())?;
    let handle = test.start(&fetch(get), (String::from("42"),));

    let _call = test.expect_call("Store.get").await?;
    let err = handle
        .wait_for_response()
        .within(Duration::from_millis(50))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        Error::Timeout {
            awaited: String::from("fetch to finish"),
            within: Duration::from_millis(50),
        }
    );

    let err = test
        .expect_call("Store.get")
        .within(Duration::from_millis(20))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "timed out after 20ms waiting for call to Store.get(..)"
    );
    Ok(())
}

#[tokio::test]
async fn stand_in_gives_up_after_response_timeout() -> callrelay::Result {
    let mut test = Harness::new(
        HarnessConfig::default().with_response_timeout(Duration::from_millis(20)),
    );
    let get = test.mimic(get_dependency())?;
    let handle = test.start(&fetch(get), (String::from("42"),));

    let _call = test.expect_call("Store.get").await?;
    handle
        .expect_panic_matches(Matcher::by("response timeout", |msg: &String| {
            msg.starts_with("no response to Store.get")
        }))
        .await?;
    Ok(())
}

#[tokio::test]
async fn injected_panic_unwinds_through_the_target() -> callrelay::Result {
    let mut test = harness();
    let get = test.mimic(get_dependency())?;
    let handle = test.start(&fetch(get), (String::from("42"),));

    test.expect_call("Store.get")
        .await?
        .inject_panic(String::from("disk full"))?;

    let err = handle
        .expect_return((String::from("x"), None::<String>))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::WrongOutcome { .. }));
    let outcome = handle.expect_panic_equals(String::from("disk full")).await?;
    assert_eq!(outcome, Outcome::Panicked(Value::new(String::from("disk full"))));
    Ok(())
}

#[tokio::test]
async fn argument_matchers() -> callrelay::Result {
    let mut test = harness();
    let store = test.mimic(Dependency::of::<(String, u32), ()>("Cache.put"))?;
    let target = Target::from_fn("put", move |(key, n): (String, u32)| {
        let store = store.clone();
        async move { store.invoke::<()>((key, n)).await }
    });
    let handle = test.start(&target, (String::from("k"), 3_u32));

    let err = test
        .expect_call("Cache.put")
        .matching(vec![
            Matcher::any(),
            Matcher::by("even", |n: &u32| n % 2 == 0),
        ])
        .await
        .unwrap_err();
    assert_eq!(
        err,
        Error::WrongValues {
            call: String::from(r#"Cache.put("k", 3)"#),
            position: 1,
            expected: String::from("even"),
            actual: String::from("3"),
        }
    );

    test.expect_call(CallTarget::Any)
        .matching(vec![Matcher::of_type::<String>(), Matcher::eq(3_u32)])
        .await?
        .inject_return(())?;
    handle.expect_return(()).await?;
    Ok(())
}

#[tokio::test]
async fn callbacks_are_matched_by_identity() -> callrelay::Result {
    let mut test = harness();
    let callback = test.mimic(Dependency::anonymous(Signature::of::<(u8,), ()>()))?;
    let target = Target::from_fn("notify", |(cb,): (Opaque<StandIn>,)| async move {
        cb.call((7_u8,)).await;
    });
    let handle = test.start(&target, (Opaque::new(callback.clone()),));

    test.expect_call(&callback)
        .with_args((7_u8,))
        .await?
        .inject_return(())?;
    handle.expect_return(()).await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn blocking_targets_call_stand_ins_synchronously() -> callrelay::Result {
    let mut test = harness();
    let get = test.mimic(get_dependency())?;
    let target = Target::from_blocking_fn("fetch_sync", move |(id,): (String,)| {
        let (value, err): (String, Option<String>) = get.invoke_blocking((id,));
        (value.len(), err.is_none())
    });
    let handle = test.start(&target, (String::from("7"),));

    test.expect_call("Store.get")
        .with_args((String::from("7"),))
        .await?
        .inject_return((String::from("seven"), None::<String>))?;
    handle.expect_return((5_usize, true)).await?;
    Ok(())
}

#[tokio::test]
async fn dropping_the_harness_releases_blocked_callers() -> callrelay::Result {
    let mut test = harness();
    let get = test.mimic(get_dependency())?;
    let handle = test.start(&fetch(get), (String::from("42"),));

    let call = test.expect_call("Store.get").await?;
    drop(test);

    handle
        .expect_panic_matches(Matcher::by("shutdown", |msg: &String| {
            msg.contains("harness shut down")
        }))
        .await?;
    assert!(call.inject_return((String::from("late"), None::<String>)).is_err());
    Ok(())
}

#[tokio::test]
async fn return_matchers_check_count_then_values() -> callrelay::Result {
    let test = harness();
    let target = Target::from_fn("pair", |(n,): (u32,)| async move { (n, n.to_string()) });
    let handle = test.start(&target, (12_u32,));

    let err = handle
        .expect_return_matches(vec![Matcher::any()])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::WrongReturnCount {
            expected: 2,
            actual: 1,
            ..
        }
    ));

    handle
        .expect_return_matches(vec![
            Matcher::by("even", |n: &u32| n % 2 == 0),
            Matcher::by("two digits", |s: &String| s.len() == 2),
        ])
        .await?;
    let err = handle
        .expect_return_matches(vec![Matcher::eq(13_u32), Matcher::any()])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ReturnMismatch { .. }), "{err}");
    Ok(())
}

#[tokio::test]
async fn untyped_async_targets_work_on_raw_values() -> callrelay::Result {
    let mut test = harness();
    let ask = test.mimic(Dependency::of::<(u32,), (u32,)>("Ask"))?;
    let target = Target::new(
        "ask_twice",
        Signature::of::<(u32,), (u32,)>(),
        move |args: Values| {
            let ask = ask.clone();
            async move {
                let first = ask.call(args).await;
                ask.call(first).await
            }
        },
    );
    let handle = test.start(&target, Values::new(vec![Value::new(1_u32)]));

    test.expect_call("Ask")
        .with_args((1_u32,))
        .await?
        .inject_return((2_u32,))?;
    test.expect_call("Ask")
        .with_args((2_u32,))
        .await?
        .inject_return((4_u32,))?;
    handle.expect_return((4_u32,)).await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn untyped_blocking_targets_work_on_raw_values() -> callrelay::Result {
    let mut test = harness();
    let get = test.mimic(get_dependency())?;
    let target = Target::blocking(
        "get_len",
        Signature::of::<(String,), (usize,)>(),
        move |args: Values| {
            let returned = get.call_blocking(args);
            let value: String = returned.arg(0).unwrap_or_default();
            Values::new(vec![Value::new(value.len())])
        },
    );
    assert!(target.is_blocking());
    let handle = test.start(&target, (String::from("k"),));

    test.expect_call("Store.get")
        .await?
        .inject_return((String::from("four"), None::<String>))?;
    handle.expect_return((4_usize,)).await?;
    Ok(())
}

#[tokio::test]
async fn eventually_any_claims_the_oldest_call() -> callrelay::Result {
    let mut test = harness();
    let x = test.mimic(Dependency::of::<(), ()>("X"))?;
    let y = test.mimic(Dependency::of::<(), ()>("Y"))?;
    let target = Target::from_fn("x_then_y", move |(): ()| {
        let (x, y) = (x.clone(), y.clone());
        async move {
            x.call(()).await;
            y.call(()).await;
        }
    });
    let handle = test.start(&target, ());

    let first = test.eventually().expect_call(CallTarget::Any).await?;
    assert_eq!(first.target().as_str(), "X");
    first.inject_return(())?;
    let second = test.eventually().expect_call(CallTarget::Any).await?;
    assert_eq!(second.target().as_str(), "Y");
    second.inject_return(())?;
    handle.expect_return(()).await?;
    Ok(())
}

#[tokio::test]
async fn eventually_finds_calls_in_either_order_when_the_second_arrives_first()
-> callrelay::Result {
    for expect_y_first in [true, false] {
        let mut test = harness();
        let x = test.mimic(Dependency::of::<(), ()>("X"))?;
        let y = test.mimic(Dependency::of::<(), ()>("Y"))?;
        let target = Target::from_fn("y_then_x", move |(): ()| {
            let (x, y) = (x.clone(), y.clone());
            async move {
                let y_call = tokio::spawn(async move { y.call(()).await });
                tokio::task::yield_now().await;
                x.call(()).await;
                let _ = y_call.await;
            }
        });
        let handle = test.start(&target, ());

        let order = if expect_y_first { ["Y", "X"] } else { ["X", "Y"] };
        let mut claimed = Vec::new();
        for name in order {
            let call = test.eventually().expect_call(name).await?;
            assert_eq!(call.target().as_str(), name);
            claimed.push(call);
        }
        assert_eq!(test.pending_calls(), 0);
        for call in claimed {
            call.inject_return(())?;
        }
        handle.expect_return(()).await?;
    }
    Ok(())
}

#[tokio::test]
async fn panic_messages_compare_as_str_or_string() -> callrelay::Result {
    let test = harness();
    let target = Target::from_fn::<(), (), _, _>("explode", |(): ()| async {
        panic!("boom");
    });
    let handle = test.start(&target, ());

    handle.expect_panic_equals("boom").await?;
    handle.expect_panic_equals(String::from("boom")).await?;
    Ok(())
}

#[tokio::test]
async fn call_blocking_from_async_code_is_rejected() -> callrelay::Result {
    let mut test = harness();
    let get = test.mimic(get_dependency())?;
    let target = Target::from_fn("misuse", move |(id,): (String,)| {
        let get = get.clone();
        async move { get.invoke_blocking::<(String, Option<String>)>((id,)) }
    });
    let handle = test.start(&target, (String::from("1"),));

    handle
        .expect_panic_matches(Matcher::by("call_blocking misuse", |msg: &String| {
            msg.contains("call_blocking used from async code")
        }))
        .await?;
    test.expect_no_calls()
        .within(Duration::from_millis(20))
        .await?;
    Ok(())
}
