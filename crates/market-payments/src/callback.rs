//! Gateway Notify Handling
//!
//! The gateway's out-of-band notify callback is the only writer of
//! order status. Settlement credits the wallet exactly once and, for
//! resource orders, immediately spends the credit on the resource.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use market_core::{AccountStore, OrderNo, OrderStore};

use crate::error::{PaymentError, Result};
use crate::gateway::verify_signature;

/// Parsed and signature-verified notify payload
#[derive(Clone, Debug)]
pub struct GatewayNotify {
    /// Merchant order number
    pub out_trade_no: String,

    /// Gateway trade status string
    pub trade_status: String,

    /// Amount the gateway says was paid
    pub total_amount: Decimal,
}

impl GatewayNotify {
    /// Whether the trade completed successfully
    pub fn is_success(&self) -> bool {
        matches!(self.trade_status.as_str(), "TRADE_SUCCESS" | "TRADE_FINISHED")
    }

    /// Whether the gateway closed the trade without payment
    pub fn is_closed(&self) -> bool {
        self.trade_status == "TRADE_CLOSED"
    }
}

/// What a notify ended up doing
#[derive(Clone, Debug)]
pub enum CallbackOutcome {
    /// Order settled: wallet credited, resource unlocked if attached
    Settled {
        order_no: OrderNo,
        coins_credited: u64,
        resource_granted: Option<u64>,
    },

    /// Replayed notify for an order that already settled
    AlreadySettled { order_no: OrderNo },

    /// Gateway closed the trade; order marked failed
    Closed { order_no: OrderNo },

    /// Trade status we treat as still pending
    Ignored { trade_status: String },
}

/// Notify handler
pub struct CallbackHandler<O: OrderStore, A: AccountStore> {
    orders: Arc<O>,
    accounts: Arc<A>,
}

impl<O: OrderStore, A: AccountStore> CallbackHandler<O, A> {
    pub fn new(orders: Arc<O>, accounts: Arc<A>) -> Self {
        Self { orders, accounts }
    }

    /// Verify the notify signature and extract the payload.
    ///
    /// Verification happens before any field is read; an unsigned or
    /// tampered notify never reaches the stores.
    pub fn parse_notify(
        &self,
        params: &BTreeMap<String, String>,
        secret: &str,
    ) -> Result<GatewayNotify> {
        verify_signature(params, secret)?;

        let field = |name: &str| {
            params
                .get(name)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| PaymentError::CallbackParse(format!("missing {name}")))
        };

        let total_amount = field("total_amount")?
            .parse::<Decimal>()
            .map_err(|e| PaymentError::CallbackParse(format!("bad total_amount: {e}")))?;

        Ok(GatewayNotify {
            out_trade_no: field("out_trade_no")?,
            trade_status: field("trade_status")?,
            total_amount,
        })
    }

    /// Process a verified notify
    pub async fn handle(&self, notify: GatewayNotify) -> Result<CallbackOutcome> {
        tracing::info!(
            order_no = %notify.out_trade_no,
            trade_status = %notify.trade_status,
            "Processing gateway notify"
        );

        let order_no = OrderNo::from_string(&notify.out_trade_no);
        let order = self
            .orders
            .get(&order_no)?
            .ok_or_else(|| PaymentError::OrderNotFound(notify.out_trade_no.clone()))?;

        if notify.is_closed() {
            // A settled order never regresses, even on a late close.
            if order.status.is_terminal() {
                return Ok(CallbackOutcome::AlreadySettled { order_no });
            }
            self.orders.fail(&order_no)?;
            tracing::info!(order_no = %order_no, "Trade closed; order failed");
            return Ok(CallbackOutcome::Closed { order_no });
        }

        if !notify.is_success() {
            tracing::debug!(trade_status = %notify.trade_status, "Unhandled trade status");
            return Ok(CallbackOutcome::Ignored {
                trade_status: notify.trade_status,
            });
        }

        if notify.total_amount != order.amount {
            return Err(PaymentError::AmountMismatch {
                expected: order.amount,
                received: notify.total_amount,
            });
        }

        let settlement = self.orders.settle(&order_no, Utc::now())?;
        if !settlement.newly_paid {
            tracing::info!(order_no = %order_no, "Notify replayed for settled order");
            return Ok(CallbackOutcome::AlreadySettled { order_no });
        }

        let order = settlement.order;
        let balance = self.accounts.credit(&order.user_id, order.coins)?;
        tracing::info!(
            order_no = %order.order_no,
            user_id = %order.user_id,
            coins = order.coins,
            balance,
            "Credited wallet"
        );

        let mut resource_granted = None;
        if let Some(resource_id) = order.resource_id {
            let outcome = self.accounts.purchase(
                &order.user_id,
                resource_id,
                order.coins,
                Some(order.order_no.clone()),
            )?;

            if outcome.granted {
                resource_granted = Some(resource_id);
                tracing::info!(
                    resource_id,
                    balance = outcome.balance,
                    "Unlocked resource"
                );
            } else {
                tracing::info!(resource_id, "Resource already owned; credit kept");
            }
        }

        Ok(CallbackOutcome::Settled {
            order_no: order.order_no.clone(),
            coins_credited: order.coins,
            resource_granted,
        })
    }
}
