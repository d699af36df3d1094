use cucumber::given;

use crate::{cucumber::FulfillmentWorld, support::TestSystem};

#[given("a fresh install")]
async fn fresh_database(world: &mut FulfillmentWorld) {
    let system = TestSystem::new().await;
    world.system = Some(system);
}
