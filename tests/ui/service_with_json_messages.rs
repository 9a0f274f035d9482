use keel_rpc::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Default, Serialize, Deserialize)]
struct Order {
    item: String,
    quantity: u32,
}

#[derive(Serialize, Deserialize)]
struct Receipt {
    total: u64,
}

#[keel_rpc::service]
#[name = "shop"]
trait Shop {
    /// Place an order.
    #[name = "placeOrder"]
    async fn place_order(order: Json<Order>) -> HandlerResult<Json<Receipt>>;
}

struct ShopImpl {
    unit_price: u64,
}

impl Shop for ShopImpl {
    async fn place_order(&self, _: Context, order: Json<Order>) -> HandlerResult<Json<Receipt>> {
        Ok(Json(Receipt {
            total: self.unit_price * u64::from(order.0.quantity),
        }))
    }
}

fn main() {
    let desc = ShopImpl::service_desc();
    assert_eq!(desc.service_name(), "shop");
    assert_eq!(desc.methods()[0].name(), "placeOrder");
}
