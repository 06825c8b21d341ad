extern crate cc;
use std::env;
use std::path::Path;

const BLOSSOM_V_FOLDER: &str = "./blossomV";

/// sources of Kolmogorov's Blossom V together with the C interface in `blossomV.cpp`
const BLOSSOM_V_SOURCES: [&str; 10] = [
    "blossomV.cpp",
    "PMinterface.cpp",
    "PMduals.cpp",
    "PMexpand.cpp",
    "PMinit.cpp",
    "PMmain.cpp",
    "PMrepair.cpp",
    "PMshrink.cpp",
    "misc.cpp",
    "MinCost/MinCost.cpp",
];

fn compile_blossom_v(is_macos: bool) {
    let mut build = cc::Build::new();
    build.cpp(true);
    for source in BLOSSOM_V_SOURCES.iter() {
        build.file(Path::new(BLOSSOM_V_FOLDER).join(source));
    }
    if !is_macos {
        build.cpp_link_stdlib("stdc++");
        build.flag("-Wno-unused-but-set-variable"); // not available in clang
    }
    build
        .flag("-Wno-unused-parameter")
        .flag("-Wno-unused-variable")
        .flag("-Wno-reorder-ctor")
        .flag("-Wno-reorder")
        .compile("blossomV");
    for source in ["blossomV.cpp", "PerfectMatching.h"] {
        println!("cargo:rerun-if-changed={}/{}", BLOSSOM_V_FOLDER, source);
    }
    println!("cargo:rustc-link-lib=static=blossomV");
    if !is_macos {
        // must come after the static blossomV library
        println!("cargo:rustc-link-lib=dylib=stdc++");
    }
}

fn main() {
    let blossom_v_present = Path::new(BLOSSOM_V_FOLDER).join("PerfectMatching.h").exists();
    if cfg!(feature = "remove_blossom_v") || !blossom_v_present {
        return;
    }
    println!("cargo:rustc-cfg=feature=\"blossom_v\"");
    let is_macos = env::var("CARGO_CFG_TARGET_OS").map_or(false, |os| os == "macos");
    compile_blossom_v(is_macos);
}
