// Diesel table definitions for the price store.

diesel::table! {
    price_records (id) {
        id -> Integer,
        price -> Double,
        created_at -> Text,
        source -> Text,
        currency -> Text,
        time_period -> Text,
    }
}

diesel::table! {
    multi_price_records (id) {
        id -> Integer,
        price -> Double,
        created_at -> Text,
        time_period -> Text,
        prices -> Text,
    }
}
