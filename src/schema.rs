table! {
    arenas (id) {
        id -> Int8,
        owner_id -> Int8,
        name -> Varchar,
        description -> Text,
        address -> Varchar,
        image_url -> Nullable<Varchar>,
        is_active -> Bool,
        is_blocked -> Bool,
        created_at -> Nullable<Timestamptz>,
        updated_at -> Nullable<Timestamptz>,
    }
}

table! {
    bookings (id) {
        id -> Int8,
        user_id -> Int8,
        slot_id -> Int8,
        status -> Varchar,
        created_at -> Nullable<Timestamptz>,
        updated_at -> Nullable<Timestamptz>,
    }
}

table! {
    court_sports (court_id, sport_id) {
        court_id -> Int8,
        sport_id -> Int8,
    }
}

table! {
    courts (id) {
        id -> Int8,
        arena_id -> Int8,
        name -> Varchar,
        price_per_hour -> Int8,
        created_at -> Nullable<Timestamptz>,
        updated_at -> Nullable<Timestamptz>,
    }
}

table! {
    reviews (id) {
        id -> Int8,
        arena_id -> Int8,
        user_id -> Int8,
        rating -> Int2,
        comment -> Nullable<Text>,
        created_at -> Nullable<Timestamptz>,
    }
}

table! {
    sports (id) {
        id -> Int8,
        name -> Varchar,
    }
}

table! {
    time_slots (id) {
        id -> Int8,
        arena_id -> Int8,
        court_id -> Int8,
        date -> Date,
        start_time -> Time,
        end_time -> Time,
        price_per_hour -> Int8,
        is_available -> Bool,
        is_blocked_by_owner -> Bool,
        is_holiday -> Bool,
        locked_until -> Nullable<Timestamptz>,
        lock_token -> Nullable<Varchar>,
        created_at -> Nullable<Timestamptz>,
        updated_at -> Nullable<Timestamptz>,
    }
}

table! {
    users (id) {
        id -> Int8,
        username -> Varchar,
        email -> Varchar,
        password -> Varchar,
        role -> Varchar,
        created_at -> Nullable<Timestamptz>,
        updated_at -> Nullable<Timestamptz>,
    }
}

joinable!(arenas -> users (owner_id));
joinable!(bookings -> time_slots (slot_id));
joinable!(bookings -> users (user_id));
joinable!(court_sports -> courts (court_id));
joinable!(court_sports -> sports (sport_id));
joinable!(courts -> arenas (arena_id));
joinable!(reviews -> arenas (arena_id));
joinable!(reviews -> users (user_id));
joinable!(time_slots -> arenas (arena_id));
joinable!(time_slots -> courts (court_id));

allow_tables_to_appear_in_same_query!(
    arenas,
    bookings,
    court_sports,
    courts,
    reviews,
    sports,
    time_slots,
    users,
);
