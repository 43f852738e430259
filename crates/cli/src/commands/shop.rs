//! Catalog, product, checkout and order history commands.

use std::path::PathBuf;

use pocket_store_core::{Address, ProductId};
use pocket_store_storefront::cart::{Cart, CartView, OrderLine};
use pocket_store_storefront::catalog::CatalogScreen;
use pocket_store_storefront::checkout::OrderSubmitter;
use pocket_store_storefront::error::{AppError, add_breadcrumb};
use pocket_store_storefront::orders::OrderHistory;
use pocket_store_storefront::products::{NewProduct, ProductPublisher};

use super::Context;

/// List the catalog, or show one product.
///
/// # Errors
///
/// Returns error if the catalog cannot be loaded or the product is unknown.
pub async fn catalog(ctx: &Context, details: Option<&str>) -> Result<(), AppError> {
    let mut screen = catalog_screen(ctx);
    screen.enter().await?;

    if let Some(id) = details {
        let details = screen
            .details(&ProductId::new(id))
            .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
        let product = details.product();
        tracing::info!("{} ({})", product.name, product.price.display());
        tracing::info!("  {}", product.description);
        tracing::info!("  Image: {}", product.image_url);
        return Ok(());
    }

    if screen.products().is_empty() {
        tracing::info!("The catalog is empty");
    }
    for product in screen.products() {
        tracing::info!("{}  {}  {}", product.id, product.name, product.price.display());
    }
    Ok(())
}

/// Publish a product.
///
/// # Errors
///
/// Returns error if a field is blank or the upload or write fails.
pub async fn add_product(
    ctx: &Context,
    name: String,
    description: String,
    price_text: String,
    image: PathBuf,
) -> Result<(), AppError> {
    let product = NewProduct {
        name,
        description,
        price_text,
        image: Some(image),
    };
    let publisher = ProductPublisher::new(
        ctx.firebase.firestore(),
        ctx.firebase.storage(),
        &ctx.config.collections.products,
    );

    let id = publisher.publish(&product).await?;
    tracing::info!("Product saved successfully with ID: {id}");
    Ok(())
}

/// Show the signed-in user's orders.
///
/// # Errors
///
/// Returns error if nobody is signed in or the orders cannot be read.
pub async fn orders(ctx: &Context) -> Result<(), AppError> {
    let history = OrderHistory::new(
        ctx.firebase.firestore(),
        ctx.firebase.auth(),
        &ctx.config.collections.orders,
    );
    let orders = history.load().await?;

    if orders.is_empty() {
        tracing::info!("No orders yet");
    }
    for order in &orders {
        let placed = order
            .created_at
            .map_or_else(|| "pending".to_owned(), |t| t.format("%Y-%m-%d %H:%M").to_string());
        tracing::info!(
            "{}  {} x{}  {}  Status: {}  ({placed})",
            order.id,
            order.product_name,
            order.quantity,
            order.line_total.display(),
            order.state,
        );
    }
    Ok(())
}

/// Build a cart from product IDs and submit it. Repeated IDs raise the
/// quantity of the same line.
///
/// # Errors
///
/// Returns error if a product is unknown, validation fails or any order
/// write fails.
pub async fn checkout(
    ctx: &Context,
    item_ids: &[String],
    address: &Address,
) -> Result<(), AppError> {
    let mut screen = catalog_screen(ctx);
    screen.enter().await?;

    let mut cart = Cart::new();
    for id in item_ids {
        let details = screen
            .details(&ProductId::new(id.as_str()))
            .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
        details.add_to_cart(&mut cart);
        add_breadcrumb("cart", "Added to cart", Some(&[("product_id", id.as_str())]));
    }

    let view = CartView::from(&cart);
    for item in &view.items {
        tracing::info!("{} x{}  {}", item.title, item.quantity, item.line_price);
    }
    tracing::info!("Total: {} ({} items)", view.total, view.item_count);

    submit(ctx, address, &cart.to_order_payload()).await
}

/// Submit a single unit of one product, bypassing the cart.
///
/// # Errors
///
/// Returns error if the product is unknown, validation fails or the write
/// fails.
pub async fn buy_now(ctx: &Context, product_id: &str, address: &Address) -> Result<(), AppError> {
    let mut screen = catalog_screen(ctx);
    screen.enter().await?;

    let details = screen
        .details(&ProductId::new(product_id))
        .ok_or_else(|| AppError::NotFound(format!("product {product_id}")))?;
    add_breadcrumb("checkout", "Buy now", Some(&[("product_id", product_id)]));

    submit(ctx, address, &details.buy_now()).await
}

fn catalog_screen(ctx: &Context) -> CatalogScreen<'_> {
    CatalogScreen::new(ctx.firebase.firestore(), &ctx.config.collections.products)
}

async fn submit(ctx: &Context, address: &Address, items: &[OrderLine]) -> Result<(), AppError> {
    let submitter = OrderSubmitter::new(
        ctx.firebase.firestore(),
        ctx.firebase.auth(),
        &ctx.config.collections.orders,
    );
    let report = submitter.submit(address, items).await?;
    tracing::info!("Data submitted successfully ({} orders)", report.written.len());
    Ok(())
}
