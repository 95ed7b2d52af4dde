const UI_ENTRY: &str = "ui/app-window.slint";

fn main() {
    println!("cargo:rerun-if-changed=ui");

    slint_build::compile(UI_ENTRY).expect("Slint build failed");
}
