//! # Cola de Trabajo
//! src/server/queue.rs
//!
//! Cola FIFO thread-safe entre el accept loop (productor) y los workers
//! (consumidores). Un solo `Mutex` protege los items y la bandera `ready`;
//! el `Condvar` despierta a los workers cuando llega algo.
//!
//! `ready` es solo una pista: un worker que despierta vuelve a mirar la cola
//! bajo el lock y, si la encuentra vacía, limpia la bandera y sigue esperando.

use super::signal::StopSignal;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

/// Error al encolar; devuelve el item para que el llamador decida qué hacer
#[derive(Debug, Error)]
pub enum PushError<T> {
    #[error("queue is full (max capacity: {capacity})")]
    Full { item: T, capacity: usize },

    #[error("queue is closed")]
    Closed(T),
}

impl<T> PushError<T> {
    /// Recupera el item rechazado
    pub fn into_inner(self) -> T {
        match self {
            PushError::Full { item, .. } => item,
            PushError::Closed(item) => item,
        }
    }
}

struct QueueState<T> {
    items: VecDeque<T>,

    /// Pista de "la cola puede tener items"
    ready: bool,

    /// Una vez cerrada no acepta más items
    closed: bool,
}

/// Cola FIFO con capacidad opcional
pub struct WorkQueue<T> {
    state: Mutex<QueueState<T>>,
    ready: Condvar,

    /// `None` = sin límite
    capacity: Option<usize>,

    /// Cota de cada espera en [`next`](Self::next)
    poll_interval: Duration,
}

impl<T> WorkQueue<T> {
    pub fn new(capacity: Option<usize>, poll_interval: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                ready: false,
                closed: false,
            }),
            ready: Condvar::new(),
            capacity,
            poll_interval,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Encola un item al final y despierta a un worker
    pub fn push(&self, item: T) -> Result<(), PushError<T>> {
        let mut state = self.lock();

        if state.closed {
            return Err(PushError::Closed(item));
        }
        if let Some(capacity) = self.capacity {
            if state.items.len() >= capacity {
                return Err(PushError::Full { item, capacity });
            }
        }

        state.items.push_back(item);
        state.ready = true;
        self.ready.notify_one();

        Ok(())
    }

    /// Saca el primer item sin bloquear
    pub fn try_pop(&self) -> Option<T> {
        let mut state = self.lock();
        let item = state.items.pop_front();
        if item.is_none() {
            state.ready = false;
        }
        item
    }

    /// Bloquea hasta obtener un item o hasta que `stop` se active
    ///
    /// Retorna `None` cuando el worker debe terminar. Los items que quedan en
    /// la cola después del stop no se entregan.
    pub fn next(&self, stop: &StopSignal) -> Option<T> {
        let mut state = self.lock();

        loop {
            if stop.is_set() || state.closed {
                return None;
            }

            if state.ready {
                if let Some(item) = state.items.pop_front() {
                    return Some(item);
                }
                // Wake obsoleto: otro worker ya se llevó el item
                state.ready = false;
                continue;
            }

            state = match self.ready.wait_timeout(state, self.poll_interval) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Despierta a todos los workers para que revisen la señal de stop
    pub fn wake_all(&self) {
        let _state = self.lock();
        self.ready.notify_all();
    }

    /// Cierra la cola y devuelve los items que nunca se procesaron
    pub fn close(&self) -> Vec<T> {
        let mut state = self.lock();
        state.closed = true;
        state.ready = false;
        let abandoned = state.items.drain(..).collect();
        self.ready.notify_all();
        abandoned
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    fn queue(capacity: Option<usize>) -> WorkQueue<u32> {
        WorkQueue::new(capacity, Duration::from_millis(10))
    }

    #[test]
    fn test_fifo_order() {
        let queue = queue(None);
        for i in 0..5 {
            queue.push(i).unwrap();
        }

        let out: Vec<u32> = std::iter::from_fn(|| queue.try_pop()).collect();
        assert_eq!(out, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_capacity() {
        let queue = queue(Some(2));
        assert!(queue.push(1).is_ok());
        assert!(queue.push(2).is_ok());

        match queue.push(3) {
            Err(PushError::Full { item, capacity }) => {
                assert_eq!(item, 3);
                assert_eq!(capacity, 2);
            }
            other => panic!("expected Full, got {:?}", other),
        }
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_closed_queue_rejects_and_drains() {
        let queue = queue(None);
        queue.push(1).unwrap();
        queue.push(2).unwrap();

        assert_eq!(queue.close(), vec![1, 2]);
        assert!(queue.is_closed());
        assert!(queue.is_empty());
        assert_eq!(queue.push(3).unwrap_err().into_inner(), 3);
    }

    #[test]
    fn test_next_returns_item_after_push() {
        let queue = Arc::new(queue(None));
        let stop = StopSignal::new();

        let consumer = {
            let queue = Arc::clone(&queue);
            let stop = stop.clone();
            thread::spawn(move || queue.next(&stop))
        };

        thread::sleep(Duration::from_millis(20));
        queue.push(7).unwrap();

        assert_eq!(consumer.join().unwrap(), Some(7));
    }

    #[test]
    fn test_next_returns_none_on_stop() {
        let queue = Arc::new(queue(None));
        let stop = StopSignal::new();

        let consumer = {
            let queue = Arc::clone(&queue);
            let stop = stop.clone();
            thread::spawn(move || {
                let start = Instant::now();
                (queue.next(&stop), start.elapsed())
            })
        };

        thread::sleep(Duration::from_millis(20));
        stop.trigger();
        queue.wake_all();

        let (item, elapsed) = consumer.join().unwrap();
        assert_eq!(item, None);
        assert!(elapsed < Duration::from_secs(2));
    }

    #[test]
    fn test_stop_leaves_items_queued() {
        let queue = queue(None);
        let stop = StopSignal::new();
        queue.push(1).unwrap();
        stop.trigger();

        assert_eq!(queue.next(&stop), None);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_each_item_delivered_once() {
        let queue = Arc::new(queue(None));
        let stop = StopSignal::new();

        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let stop = stop.clone();
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    while let Some(item) = queue.next(&stop) {
                        seen.push(item);
                    }
                    seen
                })
            })
            .collect();

        for i in 0..200 {
            queue.push(i).unwrap();
        }
        while !queue.is_empty() {
            thread::sleep(Duration::from_millis(5));
        }
        stop.trigger();
        queue.wake_all();

        let mut all: Vec<u32> = consumers.into_iter().flat_map(|c| c.join().unwrap()).collect();
        all.sort_unstable();
        assert_eq!(all, (0..200).collect::<Vec<_>>());
    }
}
