//! Sample e-commerce schema for demos and local runs.

use super::catalog::SchemaCatalog;
use super::{ColumnSpec, TableSpec};
use crate::error::Result;
use tracing::info;

const DATABASE: &str = "ecommerce";
const DB_TYPE: &str = "mysql";

/// Registers the sample tables unless the registry already holds something.
/// Returns the number of tables written.
pub async fn seed_sample_schema(catalog: &SchemaCatalog) -> Result<usize> {
    if catalog.registry().count().await > 0 {
        info!("Table schema already initialized, skipping sample data");
        return Ok(0);
    }

    info!("Initializing sample e-commerce table schemas");
    let tables = catalog.save_tables(sample_tables()).await?;
    info!("Sample schema initialized with {} tables", tables.len());
    Ok(tables.len())
}

pub fn sample_tables() -> Vec<TableSpec> {
    vec![users(), categories(), products(), orders(), order_items()]
}

fn table(name: &str, alias: &str, description: &str, pk: &str) -> TableSpec {
    TableSpec::new(name)
        .alias(alias)
        .description(description)
        .db_type(DB_TYPE)
        .database(DATABASE)
        .primary_key(pk)
}

fn col(name: &str, alias: &str, data_type: &str, description: &str) -> ColumnSpec {
    ColumnSpec::new(name, data_type)
        .alias(alias)
        .description(description)
}

fn id_col(name: &str, alias: &str, data_type: &str, description: &str) -> ColumnSpec {
    col(name, alias, data_type, description)
        .primary_key()
        .auto_increment()
}

fn users() -> TableSpec {
    table(
        "users",
        "Users",
        "Registered user accounts with profile, contact details and account status",
        "user_id",
    )
    .column(id_col("user_id", "User ID", "BIGINT", "Unique user identifier"))
    .column(col("username", "Username", "VARCHAR", "Login name").length(50).not_null())
    .column(col("email", "Email", "VARCHAR", "Email address").length(100).not_null())
    .column(col("phone", "Phone", "VARCHAR", "Mobile phone number").length(20))
    .column(col("status", "Status", "TINYINT", "Account status: 0 disabled, 1 active").default_value("1"))
    .column(col("created_at", "Created at", "DATETIME", "Registration time"))
    .column(col("updated_at", "Updated at", "DATETIME", "Last update time"))
    .column(col("last_login_at", "Last login", "DATETIME", "Last login time"))
    .column(col("gender", "Gender", "TINYINT", "Gender: 0 unknown, 1 male, 2 female"))
    .column(col("birth_date", "Birth date", "DATE", "Date of birth"))
    .column(col("city", "City", "VARCHAR", "City of residence").length(50))
}

fn categories() -> TableSpec {
    table(
        "categories",
        "Product categories",
        "Hierarchical product categories used to classify products",
        "category_id",
    )
    .column(id_col("category_id", "Category ID", "INT", "Unique category identifier"))
    .column(col("category_name", "Category name", "VARCHAR", "Category name").length(50).not_null())
    .column(col("parent_id", "Parent ID", "INT", "Parent category id, 0 for top level").default_value("0"))
    .column(col("level", "Level", "TINYINT", "Depth in the category tree").default_value("1"))
    .column(col("sort_order", "Sort order", "INT", "Display order").default_value("0"))
    .column(col("status", "Status", "TINYINT", "Status: 0 disabled, 1 enabled").default_value("1"))
    .column(col("created_at", "Created at", "DATETIME", "Creation time"))
    .column(col("description", "Description", "VARCHAR", "Category description").length(500))
}

fn products() -> TableSpec {
    table(
        "products",
        "Products",
        "Product catalog with pricing, stock, sales volume and ratings",
        "product_id",
    )
    .column(id_col("product_id", "Product ID", "BIGINT", "Unique product identifier"))
    .column(col("product_name", "Product name", "VARCHAR", "Product name").length(200).not_null())
    .column(
        col("category_id", "Category ID", "INT", "Owning category")
            .not_null()
            .references("categories", "category_id"),
    )
    .column(col("brand", "Brand", "VARCHAR", "Brand name").length(50))
    .column(col("description", "Description", "TEXT", "Detailed product description"))
    .column(col("price", "Price", "DECIMAL", "Selling price").scale(10, 2).not_null())
    .column(col("original_price", "Original price", "DECIMAL", "List price before discount").scale(10, 2))
    .column(col("stock_quantity", "Stock", "INT", "Units in stock").default_value("0"))
    .column(col("sold_quantity", "Sold", "INT", "Units sold").default_value("0"))
    .column(col("status", "Status", "TINYINT", "Status: 0 delisted, 1 on sale, 2 out of stock").default_value("1"))
    .column(col("created_at", "Created at", "DATETIME", "Creation time"))
    .column(col("updated_at", "Updated at", "DATETIME", "Last update time"))
    .column(col("is_hot", "Hot seller", "TINYINT", "Hot seller flag: 0 no, 1 yes").default_value("0"))
    .column(col("is_new", "New arrival", "TINYINT", "New arrival flag: 0 no, 1 yes").default_value("0"))
    .column(col("rating", "Rating", "DECIMAL", "Average rating from 1 to 5").scale(2, 1).default_value("5.0"))
    .column(col("review_count", "Reviews", "INT", "Number of reviews").default_value("0"))
}

fn orders() -> TableSpec {
    table(
        "orders",
        "Orders",
        "Customer orders with amounts, payment, shipping status and delivery details",
        "order_id",
    )
    .column(id_col("order_id", "Order ID", "BIGINT", "Unique order identifier"))
    .column(col("order_no", "Order number", "VARCHAR", "Human readable order number").length(32).not_null())
    .column(
        col("user_id", "User ID", "BIGINT", "Customer who placed the order")
            .not_null()
            .references("users", "user_id"),
    )
    .column(
        col("order_status", "Order status", "TINYINT",
            "Status: 0 pending payment, 1 paid, 2 shipped, 3 completed, 4 cancelled")
            .default_value("0"),
    )
    .column(col("total_amount", "Total amount", "DECIMAL", "Order total").scale(12, 2).not_null())
    .column(col("discount_amount", "Discount", "DECIMAL", "Discount applied").scale(12, 2).default_value("0"))
    .column(col("shipping_fee", "Shipping fee", "DECIMAL", "Shipping fee").scale(10, 2).default_value("0"))
    .column(col("pay_amount", "Paid amount", "DECIMAL", "Amount actually paid").scale(12, 2).not_null())
    .column(col("pay_time", "Paid at", "DATETIME", "Payment time"))
    .column(col("ship_time", "Shipped at", "DATETIME", "Shipping time"))
    .column(col("receive_time", "Received at", "DATETIME", "Delivery confirmation time"))
    .column(col("created_at", "Created at", "DATETIME", "Order creation time"))
    .column(col("updated_at", "Updated at", "DATETIME", "Last update time"))
    .column(col("shipping_address", "Shipping address", "VARCHAR", "Delivery address").length(500))
    .column(col("receiver_name", "Receiver", "VARCHAR", "Receiver name").length(50))
    .column(col("receiver_phone", "Receiver phone", "VARCHAR", "Receiver phone number").length(20))
    .column(col("pay_method", "Payment method", "TINYINT", "Payment method: 1 alipay, 2 wechat, 3 bank card"))
}

fn order_items() -> TableSpec {
    table(
        "order_items",
        "Order items",
        "Line items of each order: purchased product, unit price, quantity and subtotal",
        "item_id",
    )
    .column(id_col("item_id", "Item ID", "BIGINT", "Unique order item identifier"))
    .column(
        col("order_id", "Order ID", "BIGINT", "Owning order")
            .not_null()
            .references("orders", "order_id"),
    )
    .column(
        col("product_id", "Product ID", "BIGINT", "Purchased product")
            .not_null()
            .references("products", "product_id"),
    )
    .column(col("product_name", "Product name", "VARCHAR", "Product name snapshot").length(200).not_null())
    .column(col("product_image", "Product image", "VARCHAR", "Product image snapshot").length(255))
    .column(col("price", "Unit price", "DECIMAL", "Unit price").scale(10, 2).not_null())
    .column(col("quantity", "Quantity", "INT", "Units purchased").not_null())
    .column(col("subtotal", "Subtotal", "DECIMAL", "Line subtotal").scale(12, 2).not_null())
    .column(col("created_at", "Created at", "DATETIME", "Creation time"))
}
