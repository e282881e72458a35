use crossbeam::channel::{unbounded, RecvTimeoutError};
use std::sync::{Barrier, Mutex};
use std::thread;
use std::time::Duration;
use syncpool::{FairRwLock, ReadWriteLock};

fn wait_for_pending_writer(lock: &ReadWriteLock) {
    while lock.status().writers_waiting == 0 {
        thread::yield_now();
    }
}

#[test]
fn readers_hold_together() {
    let lock = ReadWriteLock::new();
    let barrier = Barrier::new(4);
    crossbeam::scope(|s| {
        for _ in 0..4 {
            s.spawn(|_| {
                let _read = lock.read();
                // every reader must be inside for the barrier to open
                barrier.wait();
            });
        }
    })
    .unwrap();
    assert_eq!(lock.status().readers, 0);
}

#[test]
fn pending_writer_blocks_new_readers() {
    let lock = ReadWriteLock::new();
    let first = lock.read();
    let second = lock.read();
    assert!(!lock.try_acquire_exclusive());

    crossbeam::scope(|s| {
        let writer = s.spawn(|_| {
            let _write = lock.write();
            assert_eq!(lock.status().readers, 0);
        });

        wait_for_pending_writer(&lock);
        assert!(!lock.try_acquire_shared());
        assert!(lock.try_read().is_none());
        assert_eq!(lock.status().readers, 2);

        drop(first);
        drop(second);
        writer.join().unwrap();
    })
    .unwrap();

    assert!(lock.try_acquire_shared());
    lock.release_shared();
}

#[test]
fn try_exclusive_tracks_readers() {
    let lock = ReadWriteLock::new();
    {
        let _first = lock.read();
        let _second = lock.read();
        assert!(!lock.try_acquire_exclusive());
        assert!(lock.try_acquire_shared());
        lock.release_shared();
    }
    assert!(lock.try_acquire_exclusive());
    lock.release_exclusive();
}

#[test]
fn waiting_reader_admitted_after_writer_releases() {
    let lock = ReadWriteLock::new();
    let write = lock.write();
    let (sender, receiver) = unbounded();

    crossbeam::scope(|s| {
        s.spawn(|_| {
            let _read = lock.read();
            sender.send(()).unwrap();
        });

        assert_eq!(
            receiver.recv_timeout(Duration::from_millis(50)),
            Err(RecvTimeoutError::Timeout)
        );
        drop(write);
        receiver.recv().unwrap();
    })
    .unwrap();
}

#[test]
fn writer_goes_before_later_readers() {
    let lock = ReadWriteLock::new();
    let order = Mutex::new(Vec::new());
    let read = lock.read();

    crossbeam::scope(|s| {
        s.spawn(|_| {
            let _write = lock.write();
            order.lock().unwrap().push("writer");
        });
        wait_for_pending_writer(&lock);

        s.spawn(|_| {
            let _read = lock.read();
            order.lock().unwrap().push("reader");
        });
        thread::sleep(Duration::from_millis(20));
        drop(read);
    })
    .unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["writer", "reader"]);
}

#[test]
fn writers_are_served_one_at_a_time() {
    let lock = ReadWriteLock::new();
    let inside = Mutex::new(0usize);
    crossbeam::scope(|s| {
        for _ in 0..4 {
            s.spawn(|_| {
                for _ in 0..200 {
                    let _write = lock.write();
                    let mut inside = inside.lock().unwrap();
                    *inside += 1;
                    assert_eq!(*inside, 1);
                    *inside -= 1;
                }
            });
        }
    })
    .unwrap();
    assert!(!lock.status().writer_held);
}

#[test]
fn fair_lock_keeps_every_update() {
    let value = FairRwLock::new(0u64);
    crossbeam::scope(|s| {
        for _ in 0..4 {
            s.spawn(|_| {
                for _ in 0..1000 {
                    *value.write() += 1;
                }
            });
        }
        for _ in 0..4 {
            s.spawn(|_| {
                for _ in 0..1000 {
                    assert!(*value.read() <= 4000);
                }
            });
        }
    })
    .unwrap();
    assert_eq!(value.into_inner(), 4000);
}
