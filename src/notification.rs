//! # Notificaciones
//! src/notification.rs
//!
//! Interpreta el comando crudo como una notificación `titulo&cuerpo` y lleva
//! el estado de lo que se está mostrando. En el cuerpo, cada `#` es un salto
//! de línea.
//!
//! El board no sabe de threads: se usa solo desde el contexto de la
//! aplicación, que le pasa el instante actual.

use std::time::{Duration, Instant};

pub const DEFAULT_DISPLAY_TIME: Duration = Duration::from_secs(5);

/// Título y cuerpo extraídos de un comando
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,

    /// `None` cuando el comando no traía `&`
    pub body: Option<String>,
}

impl Notification {
    /// Parsea `titulo&cuerpo`
    ///
    /// Partes después de la segunda se ignoran. Retorna `None` para el comando vacío.
    ///
    /// ```
    /// use notifier::notification::Notification;
    ///
    /// let n = Notification::parse("Build ok&All#green").unwrap();
    /// assert_eq!(n.title, "Build ok");
    /// assert_eq!(n.body.as_deref(), Some("All\ngreen"));
    ///
    /// assert!(Notification::parse("").is_none());
    /// ```
    pub fn parse(command: &str) -> Option<Self> {
        if command.is_empty() {
            return None;
        }

        let mut parts = command.split('&');
        let first = parts.next().unwrap_or_default();

        Some(match parts.next() {
            Some(body) => Self {
                title: first.to_string(),
                body: Some(body.replace('#', "\n")),
            },
            None => Self {
                title: command.to_string(),
                body: None,
            },
        })
    }
}

/// Resultado de [`NotificationBoard::update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Shown,

    /// Mismo comando que el anterior mientras seguía visible
    Repeated,

    /// Comando vacío: se vuelve a mostrar el contenido actual
    Refreshed,
}

#[derive(Debug)]
pub struct NotificationBoard {
    title: String,
    body: String,
    previous: Option<String>,
    hide_at: Option<Instant>,
    display_time: Duration,
}

impl NotificationBoard {
    pub fn new(display_time: Duration) -> Self {
        Self {
            title: String::new(),
            body: String::new(),
            previous: None,
            hide_at: None,
            display_time,
        }
    }

    /// Aplica un comando y (re)inicia el tiempo de display
    ///
    /// Todo comando muestra el board, incluso el vacío, que deja título y
    /// cuerpo como estaban.
    pub fn update(&mut self, command: &str, now: Instant) -> UpdateOutcome {
        let Some(notification) = Notification::parse(command) else {
            self.hide_at = Some(now + self.display_time);
            return UpdateOutcome::Refreshed;
        };

        let repeated = self.is_visible() && self.previous.as_deref() == Some(command);

        self.title = notification.title;
        if let Some(body) = notification.body {
            self.body = body;
        }
        self.previous = Some(command.to_string());
        self.hide_at = Some(now + self.display_time);

        if repeated {
            UpdateOutcome::Repeated
        } else {
            UpdateOutcome::Shown
        }
    }

    /// Oculta el board si ya pasó el tiempo de display
    ///
    /// Retorna `true` solo en la llamada que lo oculta.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.hide_at {
            Some(deadline) if now >= deadline => {
                self.hide_at = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.hide_at.is_some()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn display_time(&self) -> Duration {
        self.display_time
    }

    /// Tiempo hasta que se oculte, si está visible
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.hide_at.map(|deadline| deadline.saturating_duration_since(now))
    }
}

impl Default for NotificationBoard {
    fn default() -> Self {
        Self::new(DEFAULT_DISPLAY_TIME)
    }
}
