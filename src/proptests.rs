use super::*;

use proptest::prelude::*;

/// Full structural check of a vector against its model sequence.
fn validate<const W: usize>(v: &TrieVector<u64, W>, model: &[u64]) {
    assert_eq!(v.len(), model.len());
    assert_eq!(v.depth(), Node::<u64, W>::depth_for(model.len()));

    for (i, expected) in model.iter().enumerate() {
        assert_eq!(v.at(i).expect("index below len"), expected);
    }
    assert!(v.at(model.len()).is_err());

    let walked: Vec<u64> = v.iter().copied().collect();
    assert_eq!(walked, model, "leaf-cached traversal must match the model");

    // Every reachable value sits in a leaf at level 0, and nothing beyond
    // the length is reachable.
    let mut reachable = 0usize;
    check_node(&v.root, v.depth(), &mut reachable);
    assert_eq!(reachable, v.len(), "reachable value count must match len");
}

fn check_node<T, const W: usize>(node: &Node<T, W>, level: usize, reachable: &mut usize) {
    match node {
        Node::Leaf(values) => {
            assert_eq!(level, 0, "leaves must sit at the bottom level");
            *reachable += values.iter().filter(|slot| slot.is_some()).count();
        }
        Node::Branch(children) => {
            assert!(level > 0, "branches must sit above the leaves");
            for child in children.iter().flatten() {
                check_node(child, level - 1, reachable);
            }
        }
    }
}

#[derive(Clone, Debug)]
enum Op {
    Push(u64),
    Pop,
    Snapshot,
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        55 => any::<u64>().prop_map(Op::Push),
        35 => Just(Op::Pop),
        10 => Just(Op::Snapshot),
    ];
    prop::collection::vec(op, 0..=400)
}

/// Applies `ops` through the persistent API, checking every intermediate
/// version against a `Vec` model and re-checking all snapshots at the end.
fn run_persistent_ops<const W: usize>(ops: &[Op]) {
    let mut v: TrieVector<u64, W> = TrieVector::new();
    let mut model: Vec<u64> = Vec::new();
    let mut snapshots: Vec<(TrieVector<u64, W>, Vec<u64>)> = Vec::new();

    for op in ops {
        match op {
            Op::Push(value) => {
                v = v.push(*value);
                model.push(*value);
            }
            Op::Pop => match v.pop() {
                Ok(next) => {
                    assert!(model.pop().is_some());
                    v = next;
                }
                Err(err) => {
                    assert!(model.is_empty());
                    assert_eq!(err, Error::Underflow);
                }
            },
            Op::Snapshot => snapshots.push((v.clone(), model.clone())),
        }
        assert_eq!(v.len(), model.len());
    }

    validate(&v, &model);
    // Persistence: no later operation may have disturbed a snapshot.
    for (snapshot, snapshot_model) in &snapshots {
        validate(snapshot, snapshot_model);
    }
}

/// Applies `ops` through the transient builder. `Snapshot` freezes the
/// builder, keeps the frozen vector, and continues on a builder derived from
/// it, which exercises clone-on-write against live shared versions.
fn run_transient_ops<const W: usize>(ops: &[Op]) {
    let mut t: TransientVector<u64, W> = TransientVector::new();
    let mut model: Vec<u64> = Vec::new();
    let mut snapshots: Vec<(TrieVector<u64, W>, Vec<u64>)> = Vec::new();

    for op in ops {
        match op {
            Op::Push(value) => {
                t.push(*value);
                model.push(*value);
            }
            Op::Pop => assert_eq!(t.pop(), model.pop()),
            Op::Snapshot => {
                let frozen = t.freeze();
                t = frozen.transient();
                snapshots.push((frozen, model.clone()));
            }
        }
        assert_eq!(t.len(), model.len());
    }

    validate(&t.freeze(), &model);
    for (snapshot, snapshot_model) in &snapshots {
        validate(snapshot, snapshot_model);
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_persistent_ops_fanout_4(ops in ops_strategy()) {
        run_persistent_ops::<4>(&ops);
    }

    #[test]
    fn prop_persistent_ops_fanout_32(ops in ops_strategy()) {
        run_persistent_ops::<32>(&ops);
    }

    #[test]
    fn prop_transient_ops_fanout_4(ops in ops_strategy()) {
        run_transient_ops::<4>(&ops);
    }

    #[test]
    fn prop_transient_ops_fanout_32(ops in ops_strategy()) {
        run_transient_ops::<32>(&ops);
    }

    #[test]
    fn prop_transient_matches_persistent(values in prop::collection::vec(any::<u64>(), 0..=300)) {
        let persistent = values.iter().fold(TrieVector::<u64, 4>::new(), |v, x| v.push(*x));
        let transient: TrieVector<u64, 4> = values.iter().copied().collect();
        prop_assert_eq!(&persistent, &transient);
        for i in 0..values.len() {
            prop_assert_eq!(persistent.at(i).ok(), transient.at(i).ok());
        }
    }

    #[test]
    fn prop_slice_matches_vec(
        values in prop::collection::vec(any::<u64>(), 0..=120),
        start in 0usize..=130,
        end in -130isize..=130,
    ) {
        let v: TrieVector<u64, 4> = values.iter().copied().collect();
        let len = values.len();
        let resolved = if end < 0 { len as isize + end } else { end };
        let valid = start <= len && resolved >= start as isize && resolved <= len as isize;

        match v.slice(start, end) {
            Ok(sliced) => {
                prop_assert!(valid);
                prop_assert_eq!(sliced.to_vec(), values[start..resolved as usize].to_vec());
            }
            Err(Error::InvalidRange { .. }) => prop_assert!(!valid),
            Err(other) => prop_assert!(false, "unexpected error: {other}"),
        }
    }

    #[test]
    fn prop_splice_matches_vec(
        values in prop::collection::vec(any::<u64>(), 0..=120),
        insert in prop::collection::vec(any::<u64>(), 0..=40),
        start in 0usize..=130,
    ) {
        let v: TrieVector<u64, 4> = values.iter().copied().collect();

        match v.splice(start, insert.iter().copied()) {
            Ok(spliced) => {
                prop_assert!(start <= values.len());
                let mut expected = values[..start].to_vec();
                expected.extend_from_slice(&insert);
                expected.extend_from_slice(&values[start..]);
                prop_assert_eq!(spliced.to_vec(), expected);
                // The receiver is rebuilt, not mutated.
                prop_assert_eq!(v.to_vec(), values);
            }
            Err(Error::InvalidRange { .. }) => prop_assert!(start > values.len()),
            Err(other) => prop_assert!(false, "unexpected error: {other}"),
        }
    }

    #[test]
    fn prop_concat_matches_vec(
        a in prop::collection::vec(any::<u64>(), 0..=80),
        b in prop::collection::vec(any::<u64>(), 0..=80),
        c in prop::collection::vec(any::<u64>(), 0..=80),
    ) {
        let va: TrieVector<u64, 4> = a.iter().copied().collect();
        let vb: TrieVector<u64, 4> = b.iter().copied().collect();
        let vc: TrieVector<u64, 4> = c.iter().copied().collect();

        let joined = va.concat([&vb, &vc]);
        let mut expected = a.clone();
        expected.extend_from_slice(&b);
        expected.extend_from_slice(&c);

        prop_assert_eq!(joined.to_vec(), expected);
        prop_assert_eq!(va.to_vec(), a);
        prop_assert_eq!(vb.to_vec(), b);
    }

    #[test]
    fn prop_fold_matches_iterator(values in prop::collection::vec(any::<u64>(), 0..=200)) {
        let v: TrieVector<u64, 4> = values.iter().copied().collect();
        let folded = v.fold(0u128, |acc, x| acc + u128::from(*x));
        let expected: u128 = values.iter().map(|x| u128::from(*x)).sum();
        prop_assert_eq!(folded, expected);

        let reduced = v.reduce(|acc, x| acc.wrapping_add(*x));
        let expected_reduced = values.iter().copied().reduce(u64::wrapping_add);
        prop_assert_eq!(reduced, expected_reduced);
    }
}
