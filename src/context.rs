//! # Contexto de Ejecución de la Aplicación
//! src/context.rs
//!
//! Los comandos no se entregan en el thread del worker: se publican como
//! tareas en el contexto de la aplicación (típicamente su thread principal),
//! que las ejecuta cuando le toca. El worker nunca espera a la aplicación.
//!
//! [`MainLoop`] es la implementación incluida: un canal cuyo único consumidor
//! es el thread que llama a `run*`.
//!
//! ```
//! use notifier::context::{ExecutionContext, MainLoop, Turn};
//! use std::time::Duration;
//!
//! let main_loop = MainLoop::new();
//! let handle = main_loop.handle();
//!
//! std::thread::spawn(move || {
//!     handle.post(Box::new(|| println!("en el thread principal"))).unwrap();
//! });
//!
//! assert_eq!(main_loop.run_once(Duration::from_secs(5)), Turn::Ran);
//! ```

use crate::error::ContextClosed;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Tarea a ejecutar en el contexto de la aplicación
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Contexto donde la aplicación quiere recibir los comandos
pub trait ExecutionContext: Send + Sync + 'static {
    /// Publica una tarea sin esperar a que se ejecute
    fn post(&self, task: Task) -> Result<(), ContextClosed>;
}

impl<C: ExecutionContext + ?Sized> ExecutionContext for Arc<C> {
    fn post(&self, task: Task) -> Result<(), ContextClosed> {
        (**self).post(task)
    }
}

enum Message {
    Run(Task),
    Quit,
}

/// Resultado de una vuelta del loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    /// Se ejecutó una tarea
    Ran,

    /// Pasó el timeout sin tareas
    Idle,

    /// Alguien pidió `quit`
    Quit,
}

/// Loop de tareas de un solo consumidor
pub struct MainLoop {
    sender: Sender<Message>,
    receiver: Receiver<Message>,
}

/// Handle para publicar tareas en un [`MainLoop`] desde cualquier thread
#[derive(Clone)]
pub struct LoopHandle {
    sender: Sender<Message>,
}

impl MainLoop {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self { sender, receiver }
    }

    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            sender: self.sender.clone(),
        }
    }

    /// Ejecuta como máximo una tarea, esperando hasta `timeout`
    pub fn run_once(&self, timeout: Duration) -> Turn {
        match self.receiver.recv_timeout(timeout) {
            Ok(Message::Run(task)) => {
                task();
                Turn::Ran
            }
            Ok(Message::Quit) => Turn::Quit,
            Err(RecvTimeoutError::Timeout) => Turn::Idle,
            // No ocurre: el loop guarda su propio sender
            Err(RecvTimeoutError::Disconnected) => Turn::Quit,
        }
    }

    /// Ejecuta tareas hasta recibir `quit`
    pub fn run(&self) {
        while let Ok(message) = self.receiver.recv() {
            match message {
                Message::Run(task) => task(),
                Message::Quit => break,
            }
        }
    }

    /// Ejecuta tareas durante `duration` o hasta `quit`
    pub fn run_for(&self, duration: Duration) -> Turn {
        let deadline = Instant::now() + duration;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Turn::Idle;
            }
            if self.run_once(remaining) == Turn::Quit {
                return Turn::Quit;
            }
        }
    }

    /// Ejecuta tareas hasta que `done` sea verdadero o pase `timeout`
    ///
    /// Retorna el último valor de `done`.
    pub fn run_until(&self, timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while !done() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || self.run_once(remaining) == Turn::Quit {
                return done();
            }
        }
        true
    }
}

impl Default for MainLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopHandle {
    /// Pide al loop que termine después de las tareas ya publicadas
    pub fn quit(&self) -> Result<(), ContextClosed> {
        self.sender.send(Message::Quit).map_err(|_| ContextClosed)
    }
}

impl ExecutionContext for LoopHandle {
    fn post(&self, task: Task) -> Result<(), ContextClosed> {
        self.sender.send(Message::Run(task)).map_err(|_| ContextClosed)
    }
}
