fn main() {
    terrain_tools::cli::run();
}
