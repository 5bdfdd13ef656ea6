diesel::table! {
    inventory (product_id) {
        product_id -> Varchar,
        quantity -> Int4,
        reserved -> Int4,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    products (id) {
        id -> Varchar,
        name -> Varchar,
        description -> Text,
        price -> Numeric,
    }
}

diesel::table! {
    reservations (order_id, product_id) {
        order_id -> Uuid,
        product_id -> Varchar,
        quantity -> Int4,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(inventory -> products (product_id));
diesel::joinable!(reservations -> products (product_id));

diesel::allow_tables_to_appear_in_same_query!(
    inventory,
    products,
    reservations,
);
