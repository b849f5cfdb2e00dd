use posepeak::{Combinable, Executor};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

fn backends() -> Vec<Executor> {
    let mut out = vec![
        Executor::Sequential,
        Executor::scoped(2),
        Executor::scoped(3),
        Executor::scoped(16),
        Executor::preferred(),
    ];
    #[cfg(feature = "rayon")]
    out.push(Executor::Rayon);
    out
}

#[test]
fn parallel_for_runs_each_index_exactly_once() {
    for exec in backends() {
        for n in [0usize, 1, 2, 5, 17, 256] {
            let counts: Vec<AtomicUsize> = (0..n).map(|_| AtomicUsize::new(0)).collect();
            let total = AtomicUsize::new(0);
            exec.parallel_for(n, |i| {
                counts[i].fetch_add(1, Ordering::SeqCst);
                total.fetch_add(1, Ordering::SeqCst);
            });
            assert_eq!(total.load(Ordering::SeqCst), n, "{exec:?}");
            assert!(counts.iter().all(|c| c.load(Ordering::SeqCst) == 1));
        }
    }
}

#[test]
fn parallel_for_zero_never_calls() {
    for exec in backends() {
        exec.parallel_for(0, |_| panic!("must not be called"));
    }
}

#[test]
fn combinable_counts_one_entry_per_thread() {
    let k = 5;
    let acc = Combinable::new(Vec::<usize>::new);
    thread::scope(|s| {
        for t in 0..k {
            let acc = &acc;
            s.spawn(move || {
                acc.local().push(t);
                acc.local().push(t * 10);
            });
        }
    });

    let mut entries = 0;
    let mut firsts = HashSet::new();
    acc.combine_each(|values| {
        entries += 1;
        assert_eq!(values.len(), 2);
        assert_eq!(values[1], values[0] * 10);
        firsts.insert(values[0]);
    });
    assert_eq!(entries, k);
    assert_eq!(firsts, (0..k).collect());

    let merged = acc.combine(|mut a, b| {
        a.extend_from_slice(b);
        a
    });
    assert_eq!(merged.len(), 2 * k);
}

#[test]
fn combinable_default_when_untouched() {
    let acc = Combinable::new(|| 42i64);
    assert_eq!(acc.combine(|a, b| a + b), 42);
    let mut calls = 0;
    acc.combine_each(|_| calls += 1);
    assert_eq!(calls, 0);
}

#[test]
fn combinable_with_executor_sums_all_indices() {
    for exec in backends() {
        let acc = Combinable::<u64>::default();
        exec.parallel_for(1000, |i| {
            *acc.local() += i as u64;
        });
        assert!(!acc.is_empty());
        assert_eq!(acc.combine(|a, b| a + b), 999 * 1000 / 2, "{exec:?}");
    }
}
