//! # Audio Module
//!
//! Motor de reproducción del bot.
//!
//! La pieza central es [`session`]: cada guild con una conexión de voz tiene
//! una sesión que corre como tarea propia y es dueña única de su cola, su
//! estado de reproducción y su sink. Los comandos del front-end y las señales
//! de término del driver de audio entran por el mismo mailbox, así que todas
//! las mutaciones quedan serializadas en un solo dueño.
//!
//! - [`queue`] — cola FIFO con slot actual e historial
//! - [`session`] — la máquina de estados y su handle
//! - [`sink`] — el seam hacia songbird (y hacia los sinks de prueba)
//! - [`player`] — registro de sesiones por guild

pub mod player;
pub mod queue;
pub mod session;
pub mod sink;
