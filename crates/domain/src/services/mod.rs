//! Domain services for the retreat portal.
//!
//! Transport contracts the notification dispatcher depends on.

pub mod notification;

pub use notification::{
    EmailMessage, EmailTransport, EmailTransportError, MockEmailTransport, MockWhatsAppTransport,
    WhatsAppMessage, WhatsAppPayload, WhatsAppTransport, WhatsAppTransportError,
};
