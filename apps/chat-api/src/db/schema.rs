// Tables owned by the account/channel services. This crate only reads
// membership, inserts messages and updates presence columns.

diesel::table! {
    users (id) {
        id -> Int4,
        #[max_length = 20]
        username -> Varchar,
        #[max_length = 10]
        status -> Varchar,
        last_seen -> Timestamp,
    }
}

diesel::table! {
    channel_members (id) {
        id -> Int4,
        channel_id -> Int4,
        user_id -> Int4,
    }
}

diesel::table! {
    messages (id) {
        id -> Int4,
        channel_id -> Int4,
        sender_id -> Int4,
        content -> Nullable<Text>,
        #[sql_name = "type"]
        #[max_length = 10]
        type_ -> Varchar,
        created_at -> Timestamp,
    }
}

diesel::joinable!(channel_members -> users (user_id));
diesel::joinable!(messages -> users (sender_id));

diesel::allow_tables_to_appear_in_same_query!(users, channel_members, messages);
