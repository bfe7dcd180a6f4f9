//! Seed the database with a sample catalog and a demo shopper.
//!
//! Gives a fresh environment something to sell and someone to sell it to,
//! so the checkout and cancellation workflows can be exercised end to end.

use tracing::info;

use gilded_core::{Email, Money, UserId};
use gilded_server::db::{PgStore, Store};
use gilded_server::models::{NewProduct, Profile};

use super::{CommandError, connect};

/// The demo shopper's user id.
const DEMO_USER_ID: i32 = 1;

fn sample_catalog() -> Vec<NewProduct> {
    let entries: [(&str, &str, i64, i32, &str); 5] = [
        (
            "Gold Band Ring",
            "18k gold band, polished finish",
            1_250_000,
            8,
            "rings",
        ),
        (
            "Figaro Chain",
            "45cm figaro chain, 14k gold",
            2_400_000,
            5,
            "chains",
        ),
        (
            "Pearl Pendant",
            "Freshwater pearl on a gold setting",
            780_000,
            12,
            "pendants",
        ),
        (
            "Twisted Hoop Earrings",
            "Pair of twisted gold hoops",
            950_000,
            10,
            "earrings",
        ),
        (
            "Charm Bracelet",
            "Adjustable bracelet with three charms",
            1_600_000,
            6,
            "bracelets",
        ),
    ];

    entries
        .into_iter()
        .map(|(name, description, price, stock, category)| NewProduct {
            name: name.to_owned(),
            description: description.to_owned(),
            price: Money::new(price),
            stock,
            category: category.to_owned(),
            image_url: None,
        })
        .collect()
}

/// Seed the catalog and demo profile.
///
/// With `fresh`, the existing catalog and the demo profile's cart cache are
/// wiped first; orders are left untouched.
///
/// # Errors
///
/// Returns an error if the database is unreachable or writes fail.
pub async fn run(fresh: bool) -> Result<(), CommandError> {
    info!("Connecting to storefront database...");
    let pool = connect().await?;
    let store = PgStore::new(pool);

    if fresh {
        info!("Clearing existing catalog...");
        for product in store.list_products().await? {
            store.delete_product(product.id).await?;
        }
        store.save_cart(UserId::new(DEMO_USER_ID), &[]).await?;
    }

    info!("Seeding catalog...");
    for product in sample_catalog() {
        let created = store.insert_product(product).await?;
        info!(id = %created.id, name = %created.name, stock = created.stock, "Seeded product");
    }

    let email = Email::parse("demo@gilded.example")
        .map_err(|e| CommandError::InvalidData(e.to_string()))?;
    store
        .upsert_profile(Profile {
            user_id: UserId::new(DEMO_USER_ID),
            email,
            full_name: Some("Demo Shopper".to_owned()),
            address: None,
        })
        .await?;
    info!(user_id = DEMO_USER_ID, "Seeded demo shopper profile");

    info!("Seed complete");
    Ok(())
}
