table! {
    blog_category (blog_id, category_id) {
        blog_id -> Integer,
        category_id -> Integer,
    }
}

table! {
    blogs (id) {
        id -> Integer,
        title -> Text,
        description -> Nullable<Text>,
        body -> Text,
        preview -> Text,
        creator_id -> Integer,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    categories (id) {
        id -> Integer,
        name -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    comments (id) {
        id -> Integer,
        blog_id -> Integer,
        user_id -> Integer,
        body -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    likes (id) {
        id -> Integer,
        blog_id -> Integer,
        user_id -> Integer,
        created_at -> Timestamp,
    }
}

table! {
    personal_access_tokens (id) {
        id -> Integer,
        user_id -> Integer,
        name -> Text,
        token -> Text,
        created_at -> Timestamp,
        last_used_at -> Nullable<Timestamp>,
    }
}

table! {
    users (id) {
        id -> Integer,
        first_name -> Text,
        last_name -> Text,
        email -> Text,
        password -> Text,
        profile_image -> Text,
        is_admin -> Bool,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

joinable!(blog_category -> blogs (blog_id));
joinable!(blog_category -> categories (category_id));
joinable!(blogs -> users (creator_id));
joinable!(comments -> blogs (blog_id));
joinable!(comments -> users (user_id));
joinable!(likes -> blogs (blog_id));
joinable!(likes -> users (user_id));
joinable!(personal_access_tokens -> users (user_id));

allow_tables_to_appear_in_same_query!(
    blog_category,
    blogs,
    categories,
    comments,
    likes,
    personal_access_tokens,
    users,
);
