fn main() {
    println!("cargo:rerun-if-changed=components/bindings.h");

    // The esp32-camera bindings are generated by esp-idf-sys from
    // components/bindings.h; only the device build needs the ESP-IDF env.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
