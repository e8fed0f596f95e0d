// src/models/webhook.rs
use serde::Deserialize;
use serde_json::Value;

/// Evento Stripe recebido no webhook. Só lemos o que os handlers usam;
/// o objeto fica como JSON genérico.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: Value,
}

/// Tipos de evento tratados pelo router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripeEventKind {
    CheckoutSessionCompleted,
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionDeleted,
    InvoicePaymentSucceeded,
    InvoicePaymentFailed,
}

impl StripeEventKind {
    pub fn parse(event_type: &str) -> Option<Self> {
        match event_type {
            "checkout.session.completed" => Some(Self::CheckoutSessionCompleted),
            "customer.subscription.created" => Some(Self::SubscriptionCreated),
            "customer.subscription.updated" => Some(Self::SubscriptionUpdated),
            "customer.subscription.deleted" => Some(Self::SubscriptionDeleted),
            "invoice.payment_succeeded" => Some(Self::InvoicePaymentSucceeded),
            "invoice.payment_failed" => Some(Self::InvoicePaymentFailed),
            _ => None,
        }
    }
}

/// O que o router fez com o evento.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed { rows_updated: u64 },
    Ignored,
}
