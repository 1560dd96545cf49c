//! Payment methods, card validation and the simulated payment service.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use common::OrderId;
use domain::{Money, OrderStatus};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tokio::sync::Mutex;

/// Card numbers starting with this prefix are always declined.
pub const DECLINED_CARD_PREFIX: &str = "4000";

/// Default probability that a valid card charge succeeds.
pub const DEFAULT_SUCCESS_RATE: f64 = 0.9;

/// Card fields as entered by the customer.
#[derive(Clone, PartialEq, Eq)]
pub struct CardDetails {
    pub number: String,
    pub holder: String,
    /// `MM/YY`
    pub expiry: String,
    pub cvv: String,
}

impl CardDetails {
    /// Card number with spaces removed.
    pub fn digits(&self) -> String {
        self.number.chars().filter(|c| !c.is_whitespace()).collect()
    }
}

impl std::fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let digits: Vec<char> = self.digits().chars().collect();
        let last4: String = digits[digits.len().saturating_sub(4)..].iter().collect();
        f.debug_struct("CardDetails")
            .field("number", &format_args!("****{last4}"))
            .field("holder", &self.holder)
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

/// How the customer pays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentMethod {
    Card(CardDetails),
    CashOnDelivery,
}

impl PaymentMethod {
    /// Status a pending order moves to once payment is arranged.
    pub fn confirmed_status(&self) -> OrderStatus {
        match self {
            PaymentMethod::Card(_) => OrderStatus::Paid,
            PaymentMethod::CashOnDelivery => OrderStatus::Placed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card(_) => "card",
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
        }
    }
}

/// Card field validation failures.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum CardError {
    #[error("Please fill in all card details.")]
    MissingDetails,

    #[error("Please enter a valid card number.")]
    InvalidNumber,

    #[error("Please enter cardholder name.")]
    MissingHolder,

    #[error("Please enter expiry date in MM/YY format.")]
    InvalidExpiryFormat,

    #[error("Please enter a valid month (01-12).")]
    InvalidExpiryMonth,

    #[error("Your card has expired. Please use a valid card.")]
    Expired,

    #[error("Please enter a valid CVV.")]
    InvalidCvv,
}

/// Checks card fields against `today`. Touches no state.
///
/// A card is valid through the last day of its expiry month.
pub fn validate_card(card: &CardDetails, today: NaiveDate) -> Result<(), CardError> {
    if [&card.number, &card.holder, &card.expiry, &card.cvv]
        .iter()
        .any(|field| field.is_empty())
    {
        return Err(CardError::MissingDetails);
    }

    let digits = card.digits();
    if !(13..=19).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(CardError::InvalidNumber);
    }

    if card.holder.trim().is_empty() {
        return Err(CardError::MissingHolder);
    }

    let (month, year) = card
        .expiry
        .trim()
        .split_once('/')
        .filter(|(m, y)| {
            m.len() == 2
                && y.len() == 2
                && m.chars().all(|c| c.is_ascii_digit())
                && y.chars().all(|c| c.is_ascii_digit())
        })
        .ok_or(CardError::InvalidExpiryFormat)?;
    let month: u32 = month.parse().map_err(|_| CardError::InvalidExpiryFormat)?;
    let year: i32 = year.parse().map_err(|_| CardError::InvalidExpiryFormat)?;
    if !(1..=12).contains(&month) {
        return Err(CardError::InvalidExpiryMonth);
    }
    if (2000 + year, month) < (today.year(), today.month()) {
        return Err(CardError::Expired);
    }

    let cvv = card.cvv.trim();
    if !(3..=4).contains(&cvv.len()) || !cvv.chars().all(|c| c.is_ascii_digit()) {
        return Err(CardError::InvalidCvv);
    }

    Ok(())
}

/// Confirmation of a successful charge.
#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    pub payment_id: String,
}

/// Payment failures.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment failed. Please try again with a different payment method.")]
    Declined,
}

/// Trait for payment processing.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Charges `amount` for an order.
    async fn charge(
        &self,
        order_id: OrderId,
        amount: Money,
        method: &PaymentMethod,
    ) -> Result<PaymentReceipt, PaymentError>;
}

/// Simulated gateway.
///
/// Cash on delivery always succeeds. Cards with the reserved test prefix are
/// always declined; any other card succeeds with probability `success_rate`.
#[derive(Debug)]
pub struct SimulatedPaymentService {
    success_rate: f64,
    rng: Mutex<StdRng>,
}

impl SimulatedPaymentService {
    /// Creates a service drawing from OS entropy.
    pub fn new(success_rate: f64) -> Self {
        Self::with_rng(success_rate, StdRng::from_os_rng())
    }

    /// Creates a deterministic service for tests.
    pub fn seeded(success_rate: f64, seed: u64) -> Self {
        Self::with_rng(success_rate, StdRng::seed_from_u64(seed))
    }

    fn with_rng(success_rate: f64, rng: StdRng) -> Self {
        let success_rate = if success_rate.is_finite() {
            success_rate.clamp(0.0, 1.0)
        } else {
            DEFAULT_SUCCESS_RATE
        };
        Self {
            success_rate,
            rng: Mutex::new(rng),
        }
    }

    pub fn success_rate(&self) -> f64 {
        self.success_rate
    }
}

impl Default for SimulatedPaymentService {
    fn default() -> Self {
        Self::new(DEFAULT_SUCCESS_RATE)
    }
}

#[async_trait]
impl PaymentService for SimulatedPaymentService {
    #[tracing::instrument(skip(self, method), fields(method = method.as_str()))]
    async fn charge(
        &self,
        order_id: OrderId,
        amount: Money,
        method: &PaymentMethod,
    ) -> Result<PaymentReceipt, PaymentError> {
        if let PaymentMethod::Card(card) = method {
            if card.digits().starts_with(DECLINED_CARD_PREFIX) {
                tracing::info!("card declined by test prefix");
                return Err(PaymentError::Declined);
            }
            let approved = self.rng.lock().await.random_bool(self.success_rate);
            if !approved {
                tracing::info!("card declined by simulated gateway");
                return Err(PaymentError::Declined);
            }
        }

        let payment_id = format!("PAY-{}", order_id.as_uuid().simple());
        tracing::info!(%payment_id, %amount, "payment accepted");
        Ok(PaymentReceipt { payment_id })
    }
}
