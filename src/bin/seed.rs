use chrono::Utc;
use marketplace_escrow::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    entity::{
        listings::{ActiveModel as ListingActive, Column as ListingCol, Entity as Listings},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    },
    models::ListingStatus,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    let url = config
        .database_url
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set to seed"))?;

    let conn = create_orm_conn(&url).await?;
    // Ensure migrations are applied.
    run_migrations(&conn, &config.migrations_dir).await?;

    let admin_id = ensure_user(&conn, "admin@example.com", "admin").await?;
    let seller_id = ensure_user(&conn, "seller@example.com", "user").await?;
    let buyer_id = ensure_user(&conn, "buyer@example.com", "user").await?;
    seed_listings(&conn, seller_id).await?;

    println!(
        "Seed completed. Admin ID: {admin_id}, Seller ID: {seller_id}, Buyer ID: {buyer_id}"
    );
    Ok(())
}

async fn ensure_user(conn: &DatabaseConnection, email: &str, role: &str) -> anyhow::Result<Uuid> {
    if let Some(existing) = Users::find()
        .filter(UserCol::Email.eq(email))
        .one(conn)
        .await?
    {
        return Ok(existing.id);
    }

    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        role: Set(role.to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(conn)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user.id)
}

async fn seed_listings(conn: &DatabaseConnection, seller_id: Uuid) -> anyhow::Result<()> {
    let listings = [
        ("Mirrorless Camera", "24MP body, two batteries", 850_000_i64, 2),
        ("Mountain Bike", "29er, medium frame", 1_200_000, 1),
        ("Vinyl Record Crate", "Forty classic jazz records", 150_000, 5),
    ];

    for (title, description, price, quantity) in listings {
        let exists = Listings::find()
            .filter(ListingCol::SellerId.eq(seller_id))
            .filter(ListingCol::Title.eq(title))
            .one(conn)
            .await?
            .is_some();
        if exists {
            continue;
        }

        ListingActive {
            id: Set(Uuid::new_v4()),
            seller_id: Set(seller_id),
            title: Set(title.to_string()),
            description: Set(Some(description.to_string())),
            price: Set(price),
            quantity: Set(quantity),
            status: Set(ListingStatus::Active.to_string()),
            sold_at: Set(None),
            created_at: Set(Utc::now().into()),
        }
        .insert(conn)
        .await?;
        println!("Seeded listing {title}");
    }
    Ok(())
}
