diesel::table! {
    order_items (id) {
        id -> Uuid,
        order_id -> Uuid,
        position -> Int4,
        product_id -> Varchar,
        quantity -> Int4,
        price -> Numeric,
    }
}

diesel::table! {
    orders (id) {
        id -> Uuid,
        user_id -> Varchar,
        status -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(order_items -> orders (order_id));

diesel::allow_tables_to_appear_in_same_query!(
    order_items,
    orders,
);
