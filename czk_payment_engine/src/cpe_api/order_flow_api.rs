use std::fmt::Debug;

use log::*;

use crate::{
    cpe_api::EngineConfig,
    db_types::{Czk, NewOrder},
    events::{EventProducers, OrderCreatedEvent},
    traits::{OrderCreated, PaymentGatewayDatabase, PaymentGatewayError},
};

/// `OrderFlowApi` handles checkout: validating a new order, pricing it, and committing it together with its stock
/// decrements, variable symbol and pending payment.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    config: EngineConfig,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi ({:?})", self.config)
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers, config: EngineConfig) -> Self {
        Self { db, producers, config }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Checks the order and returns the total to charge.
    pub fn price_order(&self, order: &NewOrder) -> Result<Czk, PaymentGatewayError> {
        validate(order)?;
        let overflow = || PaymentGatewayError::ValidationError("The order total is too large".into());
        let mut subtotal = Czk::default();
        for item in &order.items {
            let line = item.unit_price.checked_mul(item.quantity).ok_or_else(overflow)?;
            subtotal = subtotal.checked_add(line).ok_or_else(overflow)?;
        }
        let total = subtotal.checked_add(self.config.shipping_fee).ok_or_else(overflow)?;
        if !total.is_positive() {
            return Err(PaymentGatewayError::ValidationError(format!("The order total must be positive. Got {total}")));
        }
        Ok(total)
    }
}

impl<B> OrderFlowApi<B>
where B: PaymentGatewayDatabase
{
    /// Submits a new order.
    ///
    /// The order is validated and priced first, so that a bad request never touches the database. The total is the
    /// sum of the line totals plus the configured shipping fee.
    ///
    /// Everything after that happens in one database transaction (see [`PaymentGatewayDatabase::create_order`]):
    /// either the order commits with its stock decrements, variable symbol and pending payment, or nothing changes.
    ///
    /// An [`OrderCreatedEvent`] is published after the commit.
    pub async fn create_order(&self, order: NewOrder) -> Result<OrderCreated, PaymentGatewayError> {
        let order = normalize(order);
        let total = self.price_order(&order)?;
        trace!("🔄️📦️ New order for {} items priced at {total}", order.items.len());
        let created = self.db.create_order(order, total, self.config.vs_policy).await?;
        debug!(
            "🔄️📦️ Order #{} committed. vs: {}. Stock left: {}",
            created.order.id,
            created.order.vs.as_ref().map(|v| v.as_str()).unwrap_or("-"),
            created.stock.iter().map(|s| format!("{}:{}", s.product_id, s.remaining)).collect::<Vec<_>>().join(", ")
        );
        self.call_order_created_hook(&created).await;
        Ok(created)
    }

    async fn call_order_created_hook(&self, created: &OrderCreated) {
        for emitter in &self.producers.order_created_producer {
            debug!("🔄️📦️ Notifying order created hook subscribers");
            let event = OrderCreatedEvent::new(created.order.clone(), created.items.clone());
            emitter.publish_event(event).await;
        }
    }
}

fn normalize(mut order: NewOrder) -> NewOrder {
    let c = &mut order.customer;
    c.name = c.name.trim().to_string();
    c.email = c.email.trim().to_string();
    c.address = c.address.trim().to_string();
    c.phone = c.phone.take().map(|p| p.trim().to_string()).filter(|p| !p.is_empty());
    c.note = c.note.take().map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    for item in &mut order.items {
        item.name = item.name.take().map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    }
    order
}

fn validate(order: &NewOrder) -> Result<(), PaymentGatewayError> {
    let invalid = |msg: String| Err(PaymentGatewayError::ValidationError(msg));
    let c = &order.customer;
    let missing = [("name", &c.name), ("email", &c.email), ("address", &c.address)]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(field, _)| field)
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return invalid(format!("Missing required customer fields: {}", missing.join(", ")));
    }
    if order.items.is_empty() {
        return invalid("An order needs at least one item".into());
    }
    for item in &order.items {
        if item.quantity <= 0 {
            return invalid(format!("Quantity for product {} must be positive", item.product_id));
        }
        if !item.unit_price.is_positive() {
            return invalid(format!("Unit price for product {} must be positive", item.product_id));
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db_types::{Customer, NewOrderItem};

    fn api() -> OrderFlowApi<()> {
        OrderFlowApi::new((), EventProducers::default(), EngineConfig::default())
    }

    fn order(items: Vec<NewOrderItem>) -> NewOrder {
        NewOrder::new(Customer::new("Jana", "jana@example.cz", "Dlouhá 1, Praha"), items)
    }

    #[test]
    fn two_items_plus_shipping() {
        let order = order(vec![
            NewOrderItem::new(1, 2, Czk::from_crowns(100)),
            NewOrderItem::new(2, 1, Czk::from_crowns(50)),
        ]);
        assert_eq!(api().price_order(&order).unwrap(), Czk::from_crowns(339));
        let config = EngineConfig::default().with_shipping_fee(Czk::default());
        let no_fee = OrderFlowApi::new((), EventProducers::default(), config);
        assert_eq!(no_fee.price_order(&order).unwrap(), Czk::from_crowns(250));
    }

    #[test]
    fn overflowing_totals_are_rejected() {
        let order = order(vec![NewOrderItem::new(1, i64::MAX, Czk::from_crowns(2))]);
        assert!(matches!(api().price_order(&order), Err(PaymentGatewayError::ValidationError(_))));
    }

    #[test]
    fn validation_errors() {
        let err = |o: &NewOrder| match validate(o) {
            Err(PaymentGatewayError::ValidationError(msg)) => msg,
            other => panic!("Expected a validation error. Got {other:?}"),
        };
        assert_eq!(err(&order(vec![])), "An order needs at least one item");
        assert!(err(&order(vec![NewOrderItem::new(1, 0, Czk::from_crowns(1))])).contains("Quantity"));
        assert!(err(&order(vec![NewOrderItem::new(1, 1, Czk::default())])).contains("Unit price"));
        let mut o = order(vec![NewOrderItem::new(1, 1, Czk::from_crowns(1))]);
        o.customer.email = "  ".into();
        o.customer.address = String::new();
        assert_eq!(err(&o), "Missing required customer fields: email, address");
    }

    #[test]
    fn normalization_trims_fields() {
        let mut o = order(vec![NewOrderItem::new(1, 1, Czk::from_crowns(1))]);
        o.customer.name = "  Jana ".into();
        o.customer.phone = Some("   ".into());
        let o = normalize(o);
        assert_eq!(o.customer.name, "Jana");
        assert_eq!(o.customer.phone, None);
    }
}
