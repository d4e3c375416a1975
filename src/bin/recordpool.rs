use std::env;

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    let code = recordpool_dl::cli::run(args).await;
    // exit here so a prompt still blocked on stdin does not hold the runtime open
    std::process::exit(code);
}
