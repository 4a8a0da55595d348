//! Integration tests for instance copying and custom-data access.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use implementer::{
    CopyPlan, Implementer, Instance, InstanceError, TargetType, Value, copy, copy_with_data,
    get_data, native_type, set_data,
};

fn counter_target(name: &str) -> TargetType {
    TargetType::interface(name)
        .method("int next()")
        .unwrap()
        .method("string describe()")
        .unwrap()
        .build()
}

/// An instance whose `next` increments a shared counter and whose
/// `describe` reports its custom data.
fn counter_instance(name: &str, counter: Arc<AtomicUsize>) -> Instance {
    let mut implementer = Implementer::with_data::<String>(counter_target(name));
    implementer
        .member("next")
        .unwrap()
        .callback(move || Ok(counter.fetch_add(1, Ordering::SeqCst) as i32 + 1))
        .unwrap()
        .member("describe")
        .unwrap()
        .callback_with_data(|label: String| Ok(format!("counter {label}")))
        .unwrap();
    implementer.finish_with("a").unwrap()
}

#[test]
fn test_copy_shares_bindings() {
    let counter = Arc::new(AtomicUsize::new(0));
    let original = counter_instance("ICopyShares", Arc::clone(&counter));
    let copied = original.copy();

    assert_eq!(original.call::<i32>("next", &[]).unwrap(), 1);
    assert_eq!(copied.call::<i32>("next", &[]).unwrap(), 2);
    assert_eq!(counter.load(Ordering::SeqCst), 2);

    assert_eq!(copied.type_hash(), original.type_hash());
    assert_eq!(copied.call::<String>("describe", &[]).unwrap(), "counter a");
}

#[test]
fn test_copy_with_data_is_independent() {
    let original = counter_instance("ICopyData", Arc::new(AtomicUsize::new(0)));
    let mut copied = original.copy_with_data("b").unwrap();

    assert_eq!(original.call::<String>("describe", &[]).unwrap(), "counter a");
    assert_eq!(copied.call::<String>("describe", &[]).unwrap(), "counter b");

    copied.set_data("c").unwrap();
    assert_eq!(copied.data::<String>().unwrap(), "c");
    assert_eq!(original.data::<String>().unwrap(), "a");

    assert!(matches!(
        original.copy_with_data(1i32),
        Err(InstanceError::DataTypeMismatch { .. })
    ));
}

#[test]
fn test_set_data_affects_one_instance() {
    let mut original = counter_instance("ISetData", Arc::new(AtomicUsize::new(0)));
    let copied = original.copy();

    set_data(&mut original, Value::String("z".into())).unwrap();
    assert_eq!(get_data(&original).unwrap(), Value::String("z".into()));
    assert_eq!(get_data(&copied).unwrap(), Value::String("a".into()));

    // Callbacks reading the data see the change on this instance only
    assert_eq!(original.call::<String>("describe", &[]).unwrap(), "counter z");
    assert_eq!(copied.call::<String>("describe", &[]).unwrap(), "counter a");
    let later = original.copy();
    assert_eq!(later.call::<String>("describe", &[]).unwrap(), "counter z");

    assert!(matches!(
        set_data(&mut original, Value::Int32(3)),
        Err(InstanceError::DataTypeMismatch { .. })
    ));
}

#[test]
fn test_type_erased_copy() {
    let original = counter_instance("IErasedCopy", Arc::new(AtomicUsize::new(0)));

    let copied = copy(&original).unwrap();
    assert_eq!(copied.data::<String>().unwrap(), "a");

    let replaced = copy_with_data(&original, Value::String("q".into())).unwrap();
    assert_eq!(replaced.data::<String>().unwrap(), "q");

    let not_an_instance = "plain string";
    assert_eq!(
        copy(&not_an_instance).unwrap_err(),
        InstanceError::InvalidInstance
    );
    assert_eq!(
        copy_with_data(&42i32, Value::Void).unwrap_err(),
        InstanceError::InvalidInstance
    );
}

#[test]
fn test_copy_without_custom_data() {
    let mut implementer = Implementer::new(counter_target("IPlainCopy"));
    implementer.member("next").unwrap().returns(5i32).unwrap();
    let original = implementer.finish().unwrap();

    let copied = original.copy();
    assert_eq!(copied.call::<i32>("next", &[]).unwrap(), 5);
    assert!(matches!(
        original.copy_with_data("x"),
        Err(InstanceError::NoCustomData { .. })
    ));
}

#[derive(Clone, Debug, PartialEq)]
struct Session {
    user: String,
    level: u8,
}
native_type!(Session);

#[test]
fn test_native_custom_data() {
    let target = TargetType::interface("ISession")
        .with_type::<Session>("Session")
        .method("string user()")
        .unwrap()
        .build();

    let mut implementer = Implementer::with_data::<Session>(target);
    implementer
        .member("user")
        .unwrap()
        .callback_with_data(|session: Session| Ok(session.user))
        .unwrap();

    let original = implementer
        .finish_with(Session {
            user: "ada".into(),
            level: 1,
        })
        .unwrap();
    let copied = original
        .copy_with_data(Session {
            user: "grace".into(),
            level: 2,
        })
        .unwrap();

    assert_eq!(original.call::<String>("user", &[]).unwrap(), "ada");
    assert_eq!(copied.call::<String>("user", &[]).unwrap(), "grace");
    assert_eq!(copied.data::<Session>().unwrap().level, 2);
}

#[test]
fn test_concurrent_copies_share_one_plan() {
    const THREADS: usize = 8;

    let counter = Arc::new(AtomicUsize::new(0));
    let original = Arc::new(counter_instance("IConcurrentCopy", Arc::clone(&counter)));
    let barrier = Arc::new(Barrier::new(THREADS));
    assert!(original.synthesized_type().copy_plan().is_none());

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let original = Arc::clone(&original);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let copied = original.copy_with_data(format!("t{i}")).unwrap();
                copied.call::<i32>("next", &[]).unwrap();
                let plan = copied.synthesized_type().copy_plan().unwrap() as *const CopyPlan;
                (copied.call::<String>("describe", &[]).unwrap(), plan as usize)
            })
        })
        .collect();

    let results: Vec<(String, usize)> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let mut described: Vec<String> = results.iter().map(|(text, _)| text.clone()).collect();
    described.sort();

    let mut expected: Vec<String> = (0..THREADS).map(|i| format!("counter t{i}")).collect();
    expected.sort();
    assert_eq!(described, expected);
    assert_eq!(counter.load(Ordering::SeqCst), THREADS);

    // Every thread saw the same plan, and later copies reuse it
    let plan = results[0].1;
    assert!(results.iter().all(|(_, seen)| *seen == plan));
    original.copy();
    let after = original.synthesized_type().copy_plan().unwrap() as *const CopyPlan;
    assert_eq!(after as usize, plan);
}
