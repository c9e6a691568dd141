//! Multi-threaded halo exchange over a decomposed mesh.

use cardion_core::{
    ExchangeError, FieldDef, FieldId, FieldReader, FieldRef, FieldWriter, ParameterSet, PartitionId,
};
use cardion_exchange::{ChannelCommunicator, PartitionExchange};
use cardion_field::FieldStore;
use cardion_mesh::{Decomposition, Mesh, Partition, RectMeshBuilder};
use cardion_test_utils::MockFieldStore;
use std::thread;

fn global_value(node: u32, component: u32) -> f64 {
    f64::from(node) * 1.5 + f64::from(component) * 100.0
}

fn setup(parts: u32) -> (Mesh, Vec<Partition>) {
    let mesh = RectMeshBuilder::new(1.0, 0.5, 6, 3).build().unwrap();
    let dec = Decomposition::calculated(&mesh, parts).unwrap();
    let partitions = (0..parts)
        .map(|p| dec.partition(&mesh, PartitionId(p)).unwrap())
        .collect();
    (mesh, partitions)
}

/// Runs `f` on every partition in its own thread and returns the results in
/// partition order.
fn on_workers<T: Send>(
    partitions: &[Partition],
    f: impl Fn(&Partition, PartitionExchange) -> T + Sync,
) -> Vec<T> {
    let comms = ChannelCommunicator::mesh(partitions.len() as u32);
    thread::scope(|s| {
        let handles: Vec<_> = partitions
            .iter()
            .zip(comms)
            .map(|(part, comm)| {
                let f = &f;
                s.spawn(move || {
                    let ex = PartitionExchange::new(part, Box::new(comm)).unwrap();
                    f(part, ex)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

#[test]
fn reconcile_fills_halo_from_owners_and_is_idempotent() {
    let (_mesh, partitions) = setup(3);
    let results = on_workers(&partitions, |part, mut ex| {
        let mut store = FieldStore::new(part.local_count());
        let vm = store.register(FieldDef::scalar("Vm").keep_previous()).unwrap();
        let mat = store.register(FieldDef::with_components("materials", 2)).unwrap();
        let slots = [
            FieldRef::values(vm, 0),
            FieldRef::values(vm, 0).in_set(ParameterSet::PreviousValues),
            FieldRef::values(mat, 1),
        ];
        for (k, &slot) in slots.iter().enumerate() {
            let values = store.write(slot).unwrap();
            for (l, v) in values.iter_mut().enumerate() {
                *v = if part.is_owned(l as u32) {
                    global_value(part.global(l as u32).0, k as u32)
                } else {
                    f64::NAN
                };
            }
        }
        ex.reconcile(&mut store, &slots).unwrap();
        let first: Vec<Vec<f64>> = slots.iter().map(|&s| store.read(s).unwrap().to_vec()).collect();
        ex.reconcile(&mut store, &slots).unwrap();
        let second: Vec<Vec<f64>> = slots.iter().map(|&s| store.read(s).unwrap().to_vec()).collect();
        (first, second)
    });

    for (part, (first, second)) in partitions.iter().zip(results) {
        assert_eq!(first, second, "reconcile is not idempotent");
        for (k, values) in first.iter().enumerate() {
            for (l, v) in values.iter().enumerate() {
                let node = part.global(l as u32).0;
                assert_eq!(*v, global_value(node, k as u32), "partition {}", part.id());
            }
        }
    }
}

#[test]
fn update_halo_and_reductions_agree_across_partitions() {
    let (mesh, partitions) = setup(2);
    let results = on_workers(&partitions, |part, mut ex| {
        let mut values: Vec<f64> = (0..part.local_count())
            .map(|l| {
                if part.is_owned(l as u32) {
                    f64::from(part.global(l as u32).0)
                } else {
                    -1.0
                }
            })
            .collect();
        ex.update_halo(&mut values).unwrap();
        let owned_sum: f64 = values[..part.owned_count()].iter().sum();
        let total = ex.all_reduce_sum(owned_sum).unwrap();
        let many = ex
            .all_reduce_sum_many(&[1.0, part.owned_count() as f64])
            .unwrap();
        ex.barrier().unwrap();
        (values, total, many)
    });

    let n = mesh.node_count() as f64;
    for (part, (values, total, many)) in partitions.iter().zip(results) {
        for (l, v) in values.iter().enumerate() {
            assert_eq!(*v, f64::from(part.global(l as u32).0));
        }
        assert_eq!(total, n * (n - 1.0) / 2.0);
        assert_eq!(many, vec![2.0, n]);
    }
}

#[test]
fn exchange_rejects_mismatched_communicator() {
    let (_mesh, partitions) = setup(2);
    let mut comms = ChannelCommunicator::mesh(2);
    let c1 = comms.pop().unwrap();
    assert!(PartitionExchange::new(&partitions[0], Box::new(c1)).is_err());
}

#[test]
fn reconcile_works_through_the_field_traits_alone() {
    let (_mesh, partitions) = setup(2);
    let slot = FieldRef::values(FieldId(0), 0);
    let missing = FieldRef::values(FieldId(1), 0);
    let results = on_workers(&partitions, |part, mut ex| {
        let values = part
            .nodes()
            .iter()
            .enumerate()
            .map(|(l, node)| {
                if part.is_owned(l as u32) {
                    global_value(node.0, 0)
                } else {
                    f64::NAN
                }
            })
            .collect();
        let mut store = MockFieldStore::new(part.local_count()).with_slot(slot, values);

        let err = ex.reconcile(&mut store, &[slot, missing]).unwrap_err();
        assert!(matches!(err, ExchangeError::UnknownSlot { .. }));
        assert_eq!(store.write_count(), 0);

        ex.reconcile(&mut store, &[slot]).unwrap();
        store.read(slot).unwrap().to_vec()
    });
    for (part, values) in partitions.iter().zip(results) {
        for (node, v) in part.nodes().iter().zip(values) {
            assert_eq!(v, global_value(node.0, 0));
        }
    }
}

#[test]
fn reconcile_waits_for_partitions_without_a_shared_halo() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    let (_mesh, partitions) = setup(3);
    let links = |p: &Partition| {
        p.send_links()
            .iter()
            .chain(p.recv_links())
            .map(|l| l.peer)
            .collect::<Vec<_>>()
    };
    assert!(!links(&partitions[0]).contains(&PartitionId(2)));

    let entered = AtomicUsize::new(0);
    let seen = on_workers(&partitions, |part, mut ex| {
        let mut store = FieldStore::new(part.local_count());
        let vm = store.register(FieldDef::scalar("Vm")).unwrap();
        if part.id() == PartitionId(2) {
            thread::sleep(Duration::from_millis(200));
        }
        entered.fetch_add(1, Ordering::SeqCst);
        ex.reconcile(&mut store, &[FieldRef::values(vm, 0)]).unwrap();
        entered.load(Ordering::SeqCst)
    });
    assert_eq!(seen, vec![3, 3, 3]);
}
