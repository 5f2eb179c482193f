use build_script_cfg::Cfg;
use find_cuda_helper::find_cuda_root;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Follows the toolkit detection of `cuda` and `cublas`,
    // whose items only exist when it succeeds.
    let nvidia = Cfg::new("nvidia");
    if find_cuda_root().is_some() {
        nvidia.define()
    }
}
