mod config {
    mod load_save;
}

mod error {
    mod codec;
    mod send_message;
}

mod operation {
    mod background;
    mod cancellation;
    mod helpers;
    mod send_message;
}
